use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "powledger-cli")]
#[command(about = "CLI client for the proof-of-work ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:6000)
    #[arg(long, global = true, default_value = "http://127.0.0.1:6000")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a transaction and mine it into a new block
    Submit {
        /// Transaction description
        #[arg(long)]
        transaction: String,
        /// Amount
        #[arg(long)]
        amount: String,
        /// Customer identifier
        #[arg(long)]
        customer_id: String,
        /// Only queue the transaction; do not mine
        #[arg(long)]
        queue_only: bool,
    },
    /// Mine whatever is pending
    Mine,
    /// Print the whole chain
    Chain,
    /// Print the pending transactions
    Pending,
}

#[derive(Serialize)]
struct NewBlockForm {
    transaction: String,
    amount: String,
    #[serde(rename = "customerID")]
    customer_id: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/');
    let client = reqwest::Client::new();

    let request = match cli.cmd {
        Command::Submit {
            transaction,
            amount,
            customer_id,
            queue_only,
        } => {
            let form = NewBlockForm {
                transaction,
                amount,
                customer_id,
            };
            if queue_only {
                client.post(format!("{node}/tx")).json(&form)
            } else {
                client.post(format!("{node}/new_block")).form(&form)
            }
        }
        Command::Mine => client.post(format!("{node}/mine")),
        Command::Chain => client.get(format!("{node}/chain")),
        Command::Pending => client.get(format!("{node}/pending")),
    };

    debug!(?request, "sending request");
    let res = request.send().await?;
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}
