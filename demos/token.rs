//! Issue and verify tokens from the command line with the scope configured
//! in the environment (`JWT_KEY` or `JWT_KEY_FILE`, `JWT_ISSUE_ALGORITHM`).
//!
//! Loads `.env` automatically if present, otherwise reads from the environment.
//!
//! ```bash
//! cargo run --example token -- issue '{"sub":"alice"}'
//! cargo run --example token -- verify eyJhbG...
//! ```

use axum_jwt_filter::{issue_token, verify_token, ClaimSet, JwtConfig, JwtScope};

fn main() {
    // Load .env if present; silently ignore if absent.
    dotenvy::dotenv().ok();

    let scope = JwtConfig::from_env()
        .and_then(|config| config.build())
        .unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            std::process::exit(1);
        });

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        usage();
    }

    match args[0].as_str() {
        "issue" => {
            let json = args.get(1).unwrap_or_else(|| usage());
            match issue(&scope, json) {
                Ok(token) => println!("{token}"),
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                }
            }
        }
        "verify" => {
            let token = args.get(1).unwrap_or_else(|| usage());
            match scope.key().and_then(|key| verify_token(token, key)) {
                Ok(claims) => {
                    println!("Valid\n");
                    for (name, value) in claims.as_map() {
                        println!("  {name:<4}: {value}");
                    }
                    println!("\n  header: {}", claims.to_header_value());
                }
                Err(e) => {
                    eprintln!("Failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        _ => usage(),
    }
}

fn issue(scope: &JwtScope, json: &str) -> Result<String, axum_jwt_filter::JwtError> {
    let claims = ClaimSet::from_json(json.as_bytes())?;
    issue_token(&claims, scope.issue_algorithm(), scope.issue_key()?)
}

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  cargo run --example token -- issue  '<claims json>'");
    eprintln!("  cargo run --example token -- verify <token>");
    std::process::exit(1);
}
