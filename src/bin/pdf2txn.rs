//! CLI tool for extracting bank statement transactions from a PDF

use pdf_statement::extract_transactions;
use std::env;
use std::process;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <pdf_file>", args[0]);
        eprintln!("       {} <pdf_file> --json", args[0]);
        eprintln!();
        eprintln!("Extracts Date/Description/Amount/Fees/Balance records.");
        process::exit(1);
    }

    let pdf_path = &args[1];
    let json_output = args.get(2).map(|a| a == "--json").unwrap_or(false);

    match extract_transactions(pdf_path) {
        Ok(data) => {
            if json_output {
                match serde_json::to_string(&data) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        println!("{}", serde_json::json!({ "error": e.to_string() }));
                        process::exit(1);
                    }
                }
            } else {
                println!("{}", data.headers.join("\t"));
                for transaction in &data.transactions {
                    println!("{}", transaction.fields().join("\t"));
                }
                eprintln!();
                eprintln!("Extracted {} transactions", data.transactions.len());
            }
        }
        Err(e) => {
            if json_output {
                println!("{}", serde_json::json!({ "error": e.to_string() }));
            } else {
                eprintln!("Error: {}", e);
            }
            process::exit(1);
        }
    }
}
