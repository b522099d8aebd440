use std::env;
use std::io;
use std::process;

use tracing_subscriber::EnvFilter;
use voucher_eng::api::HttpVoucherApi;
use voucher_eng::model::Voucher;
use voucher_eng::snapshot::{read_vouchers, write_actions};
use voucher_eng::{Command, VoucherAction, Workflow};

const USAGE: &str = "usage: voucher-eng actions <vouchers.json>\n       voucher-eng <post|lock|reverse|cancel> <vouchers.json> <voucher-no> [reason]";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        exit_usage()
    };

    match command.as_str() {
        "actions" => {
            let Some(path) = args.get(1) else { exit_usage() };
            let vouchers = load(path);
            write_actions(io::stdout().lock(), &vouchers);
        }
        "post" | "lock" | "reverse" | "cancel" => {
            let (Some(path), Some(voucher_no)) = (args.get(1), args.get(2)) else {
                exit_usage()
            };
            let action = match command.as_str() {
                "post" => VoucherAction::Post,
                "lock" => VoucherAction::Lock,
                "reverse" => VoucherAction::Reverse,
                _ => VoucherAction::Cancel,
            };
            let reason = args.get(3).cloned();

            let Ok(base_url) = env::var("VOUCHER_API_URL") else {
                eprintln!("VOUCHER_API_URL must be set");
                process::exit(2);
            };

            let mut workflow = Workflow::new(HttpVoucherApi::new(base_url));
            for voucher in load(path) {
                workflow.load(voucher);
            }

            let Some(id) = workflow.find_by_no(voucher_no).map(|v| v.id) else {
                eprintln!("voucher {voucher_no} not found");
                process::exit(2);
            };

            match workflow
                .dispatch(Command {
                    voucher: id,
                    action,
                    reason,
                })
                .await
            {
                Ok(()) => {
                    if let Some(voucher) = workflow.get(id) {
                        let locked = if voucher.is_locked { " (locked)" } else { "" };
                        println!("{} {}{}", voucher.voucher_no, voucher.status, locked);
                    }
                }
                Err(e) => {
                    eprintln!("{e}");
                    process::exit(1);
                }
            }
        }
        _ => exit_usage(),
    }
}

fn load(path: &str) -> Vec<Voucher> {
    match read_vouchers(path) {
        Ok(vouchers) => vouchers,
        Err(e) => {
            eprintln!("{e}");
            process::exit(2);
        }
    }
}

fn exit_usage() -> ! {
    eprintln!("{USAGE}");
    process::exit(2)
}
