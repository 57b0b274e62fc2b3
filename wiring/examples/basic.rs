//! Basic example of the Wiring container.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use wiring::prelude::*;

// === Define your services ===

struct ConsoleLogger {
    prefix: String,
}

impl ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[{}] {msg}", self.prefix);
    }
}

impl Service for ConsoleLogger {}

struct Database {
    url: String,
    logger: Arc<ConsoleLogger>,
    connected: Mutex<bool>,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.url)
    }
}

#[async_trait]
impl Service for Database {
    async fn invoke_async(&self, method: &str) -> Option<Result<(), BoxError>> {
        match method {
            "connect" => {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                *self.connected.lock() = true;
                self.logger.log(&format!("Connected to {}", self.url));
                Some(Ok(()))
            }
            _ => None,
        }
    }
}

#[derive(Default)]
struct UserRepository {
    db: Mutex<Option<Arc<Database>>>,
}

impl UserRepository {
    fn find_user(&self, id: u64) -> String {
        match self.db.lock().as_ref() {
            Some(db) => db.query(&format!("SELECT * FROM users WHERE id = {id}")),
            None => "no database".to_string(),
        }
    }
}

impl Service for UserRepository {
    fn invoke(&self, method: &str, args: Vec<Argument>) -> Option<Result<(), BoxError>> {
        match method {
            "setDatabase" => Some(match args[0].downcast::<Database>() {
                Some(db) => {
                    *self.db.lock() = Some(db);
                    Ok(())
                }
                None => Err("setDatabase expects a database".into()),
            }),
            _ => None,
        }
    }
}

fn main() -> Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter("wiring_container=debug")
        .init();

    let loader = ServiceLoader::new(["app"])
        .constructor("app/logger", |args| {
            Ok(ConsoleLogger {
                prefix: args[0].parse()?,
            })
        })
        .constructor("app/database", |args| {
            Ok(Database {
                url: args[0].parse()?,
                logger: args[1].downcast::<ConsoleLogger>().ok_or("database needs a logger")?,
                connected: Mutex::new(false),
            })
        })
        .constructor("app/user-repository", |_| Ok(UserRepository::default()))
        .function("app/greet", |args| {
            Ok(json!(format!("hello, {}", args[0].as_str().unwrap_or("stranger"))))
        });

    // Build the container
    let registry = ContainerBuilder::new().loader(loader).build_blocking(json!({
        "parameters": {
            "database_url": "postgres://localhost/myapp",
            "log_prefix": "LOG"
        },
        "services": [
            // UserRepository — configured through a call
            {
                "id": "users",
                "constructor": "user-repository",
                "calls": [{"method": "setDatabase", "arguments": ["@database"]}],
                "scope": "request"
            },
            // Database — connects before the build returns
            {
                "id": "database",
                "constructor": "database",
                "arguments": ["%database_url%", "@logger"],
                "initialization": {"method": "connect", "hasCallback": true},
                "tags": [{"name": "health.check", "parameters": {"critical": true}}]
            },
            {"id": "logger", "constructor": "logger", "arguments": ["%log_prefix%"]},
            {"id": "greet", "function": "greet"}
        ]
    }))?;

    println!("✅ Container built successfully!");
    println!("{registry:?}");
    println!("📋 Services: {:?}", registry.service_ids());

    let db = registry.get_as::<Database>("database").expect("database is registered");
    println!("🔌 Connected: {}", *db.connected.lock());

    let users = registry.get_as::<UserRepository>("users").expect("users is registered");
    println!("👤 {}", users.find_user(42));
    println!("🔭 Scope of users: {}", registry.scope("users"));

    for tag in registry.tags_by_name("health.check").unwrap_or_default() {
        println!("🏷  {} (critical: {:?})", tag.service_id(), tag.parameter("critical"));
    }

    let greet = registry.get_as::<FunctionService>("greet").expect("greet is registered");
    match greet.call(&[json!("world")]) {
        Ok(greeting) => println!("💬 {greeting}"),
        Err(e) => println!("❌ greet failed: {e}"),
    }

    println!("\n🎉 Everything works!");
    Ok(())
}
