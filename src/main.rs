use dotenvy::dotenv;
use lectern::config::Config;
use lectern::error::ApplicationError;
use lectern::logger;

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    dotenv().ok();

    let config = Config::from_env()?;

    let _guard = logger::init(&config)?;

    lectern::run(config).await
}
