//! Command-line front end for the permit engine.
//!
//! Computes domain separators and permit digests, signs permits with a local
//! key, and replays JSON batches of engine calls against an engine built from
//! the configuration file.

use alloy_primitives::{Address, U256};
use clap::{Parser, Subcommand};
use permit_account::implementations::local::LocalAccount;
use permit_account::AccountService;
use permit_config::Config;
use permit_core::{build_digest, DomainSeparator, PermitEngineBuilder};
use permit_types::{Permit, SecretString};
use std::path::PathBuf;

mod batch;
mod factory_registry;

/// Command-line arguments for the permit tool.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", global = true)]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info", global = true)]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Print the EIP-712 domain separator of the configured token
	Domain,
	/// Print the digest a holder must sign
	Digest {
		#[arg(long)]
		holder: Address,
		#[command(flatten)]
		fields: PermitFields,
	},
	/// Sign a permit with a local key, or the configured account if none is given
	Sign {
		#[arg(long, env = "PERMIT_PRIVATE_KEY", hide_env_values = true)]
		private_key: Option<String>,
		#[command(flatten)]
		fields: PermitFields,
	},
	/// Execute a JSON batch of calls and print the report
	Apply {
		/// Path to the batch file
		file: PathBuf,
	},
}

/// Signed permit fields other than the holder.
#[derive(clap::Args, Debug)]
struct PermitFields {
	#[arg(long)]
	spender: Address,
	#[arg(long)]
	value: U256,
	#[arg(long, default_value = "0")]
	nonce: U256,
	#[arg(long)]
	deadline: U256,
}

impl PermitFields {
	fn into_permit(self, owner: Address) -> Permit {
		Permit {
			owner,
			spender: self.spender,
			value: self.value,
			nonce: self.nonce,
			deadline: self.deadline,
		}
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_writer(std::io::stderr)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let config_path = args.config.to_string_lossy();
	let config = Config::from_file(&config_path).await?;
	tracing::info!(token = %config.token.name, chain_id = config.token.chain_id, "Loaded configuration");

	let domain = DomainSeparator::new(
		config.token.name.clone(),
		config.token.chain_id,
		config.token.address,
	);

	match args.command {
		Command::Domain => {
			println!("{}", domain.hash());
		},
		Command::Digest { holder, fields } => {
			let permit = fields.into_permit(holder);
			println!("{}", build_digest(&domain.hash(), &permit));
		},
		Command::Sign {
			private_key,
			fields,
		} => {
			let account = match private_key {
				Some(key) => {
					AccountService::new(Box::new(LocalAccount::new(&SecretString::from(key))?))
				},
				None => {
					let account_config = config
						.account
						.as_ref()
						.ok_or("No --private-key given and no [account] configured")?;
					factory_registry::build_account(account_config)?
				},
			};

			let holder = account.get_address().await?;
			let permit = fields.into_permit(holder);
			let digest = build_digest(&domain.hash(), &permit);
			let signature = account.sign_digest(&digest).await?;

			let output = serde_json::json!({
				"holder": holder,
				"digest": digest,
				"v": signature.v,
				"r": signature.r,
				"s": signature.s,
				"signature": signature.to_string(),
			});
			println!("{}", serde_json::to_string_pretty(&output)?);
		},
		Command::Apply { file } => {
			let content = tokio::fs::read_to_string(&file).await?;
			let batch: batch::Batch = serde_json::from_str(&content)?;

			let engine =
				PermitEngineBuilder::new(config).build(factory_registry::ledger_factories())?;
			let report = batch::run(&engine, batch).await;
			println!("{}", serde_json::to_string_pretty(&report)?);
		},
	}

	Ok(())
}
