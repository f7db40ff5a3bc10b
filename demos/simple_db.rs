use tracing_subscriber::EnvFilter;
use tx2_persist::prelude::*;

#[derive(Debug, Default)]
struct Person {
    id: i32,
    name: String,
    surname: String,
}

declare_persistent!(Person => PersonFields { id, name, surname });

#[derive(Debug, Default)]
struct Account {
    id: i32,
    owner: i32,
    email: String,
}

declare_persistent!(Account => AccountFields { id, owner, email });

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let session = match Session::<SqliteBackend>::connect_or_report("sqlite::memory:", |err| {
        eprintln!("cannot open database: {}", err)
    })
    .await
    {
        Some(session) => session,
        None => return Ok(()),
    };

    let person = Person::fields();
    let account = Account::fields();

    session
        .create_table_with(&[person.id.assign(primary_key()), person.name.assign(not_null())])
        .await?;
    session
        .create_table_with(&[
            account.id.assign(primary_key()),
            account.email.assign(unique()),
            account.owner.assign(foreign_key(person.id)),
        ])
        .await?;

    let people: Vec<Person> = (0..25)
        .map(|id| Person {
            id,
            name: format!("name {}", id),
            surname: format!("surname {}", id),
        })
        .collect();
    session.persist_all(&people).await?;

    session
        .persist(&Account {
            id: 1,
            owner: 20,
            email: "twenty@example.com".to_string(),
        })
        .await?;

    println!("persons: {}", query_from::<Person>().count(&session).await?);

    let top = query_from::<Person>()
        .order_by_desc([person.name])
        .order_by_asc([person.id])
        .limit(5)
        .objects(&session)
        .await?;
    for p in &top {
        println!("{:>3} {} {}", p.id, p.name, p.surname);
    }

    let found = query_from::<Person>()
        .where_clause(person.id.eq(20) & person.name.eq("name 20"))
        .object(&session)
        .await?;
    println!("found: {:?}", found);

    let orphan = session
        .persist(&Account {
            id: 2,
            owner: 99,
            email: "nobody@example.com".to_string(),
        })
        .await;
    if let Err(err) = orphan {
        println!("rejected orphan account: {}", err);
    }

    Ok(())
}
