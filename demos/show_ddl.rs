use tx2_persist::dml;
use tx2_persist::prelude::*;

#[derive(Debug, Default)]
struct Player {
    id: i32,
    name: String,
    email: String,
    score: f64,
}

declare_persistent!(Player => PlayerFields { id, name, email, score });

#[derive(Debug, Default)]
struct Inventory {
    id: i32,
    player: i32,
    item_code: FixedText<8>,
    quantity: u32,
}

declare_persistent!(Inventory => InventoryFields { id, player, item_code, quantity });

fn main() -> Result<()> {
    let registry = SchemaRegistry::new();
    let player = Player::fields();
    let inventory = Inventory::fields();

    registry.configure(&[
        player.id.assign(primary_key()),
        player.name.assign(not_null()),
        player.email.assign(unique()),
    ])?;

    registry.configure(&[
        inventory.id.assign(primary_key()),
        inventory.player.assign(foreign_key(player.id)),
        inventory.quantity.assign(not_null()),
    ])?;

    println!("Generated DDL:");
    println!("{};", registry.create_table_sql::<Player>()?);
    println!("{};", registry.create_table_sql::<Inventory>()?);

    println!("\nInventory constraints:");
    println!("{}", registry.constraints::<Inventory>().to_json()?);

    let insert = dml::insert(
        &Player {
            id: 1,
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            score: 1500.0,
        },
        |_, _| "?".to_string(),
    );
    println!("\nInsert:");
    println!("{}", insert.sql);
    println!("params: {:?}", insert.params);

    let query = query_from::<Player>()
        .where_clause(player.score.gt(1000) & player.name.ne("Bob"))
        .order_by_desc([player.score])
        .order_by_asc([player.name])
        .limit(10);
    println!("\nQuery:");
    println!("{}", query.build()?);
    println!("{}", query.build_count()?);

    Ok(())
}
