use marlin::MarlinError;
use marlin::chain::ChainReader;
use marlin::codec::decode_order_book;
use marlin::config::fetch_config;
use marlin::corridor::{read_corridor, read_reserves};
use marlin::rpc::HttpChainReader;

#[tokio::main]
async fn main() -> Result<(), MarlinError> {
    // Initialize tracing subscriber for logging output.
    tracing_subscriber::fmt::init();

    let config = fetch_config()?;
    let reader = HttpChainReader::new(config.rpc.endpoint.clone(), config.rpc.api_key.clone())?;
    let order_book = &config.venue.addresses.order_book;

    let corridor = read_corridor(&reader, order_book).await?;
    let reserves = read_reserves(&reader, order_book).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "corridor": corridor,
            "reserves": reserves,
        }))?
    );

    match reader.account_state(order_book).await? {
        Some(raw) => {
            let snapshot = decode_order_book(&raw)?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        None => println!("order book contract has no state"),
    }

    Ok(())
}
