use dotenvy::dotenv;
use std::env;

use needs_nearby::database::SqliteBackend;

// Usage: add_account <email> <password>
#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let [email, password] = args.as_slice() else {
        eprintln!("usage: add_account <email> <password>");
        std::process::exit(2);
    };

    let db_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://needs.db?mode=rwc".to_string());
    let backend = match SqliteBackend::connect(&db_url, 1).await {
        Ok(b) => b,
        Err(e) => {
            eprintln!("could not open {}: {}", db_url, e);
            std::process::exit(1);
        }
    };

    match backend.create_account(email, password).await {
        Ok(user_id) => println!("account created: {} ({})", email, user_id),
        Err(e) => {
            eprintln!("account creation failed: {}", e);
            std::process::exit(1);
        }
    }
}
