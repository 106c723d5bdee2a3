//! CLI tool for reconstructing the row/column layout of a PDF

use pdf_statement::process_pdf;
use std::env;
use std::process;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <pdf_file>", args[0]);
        eprintln!("       {} <pdf_file> --json", args[0]);
        eprintln!();
        eprintln!("Groups positioned text into rows and splits rows into columns.");
        eprintln!("Prints tab-separated cells, one line per row.");
        process::exit(1);
    }

    let pdf_path = &args[1];
    let json_output = args.get(2).map(|a| a == "--json").unwrap_or(false);

    match process_pdf(pdf_path) {
        Ok(layout) => {
            if json_output {
                let output = serde_json::json!({
                    "page_count": layout.page_count,
                    "row_count": layout.matrix.row_count,
                    "column_count": layout.matrix.column_count,
                    "processing_time_ms": layout.processing_time_ms,
                    "rows": layout.matrix.rows,
                });
                println!("{}", output);
            } else {
                println!("{}", layout.matrix.to_tsv());
                eprintln!();
                eprintln!(
                    "{} pages, {} rows x {} columns in {}ms",
                    layout.page_count,
                    layout.matrix.row_count,
                    layout.matrix.column_count,
                    layout.processing_time_ms
                );
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
