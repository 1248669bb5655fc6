//! Reports whether the credentials the chat server needs are present in the environment.

use colored::*;
use std::process::ExitCode;

const REQUIRED: [(&str, &str); 3] = [
    ("CF_ACCOUNT_ID", "Cloudflare Account ID"),
    ("CF_API_TOKEN", "Cloudflare API Token"),
    ("WEATHER_API_KEY", "WeatherAPI.com API Key"),
];

/// First and last four characters with the middle starred out.
fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 8))
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    println!("Checking environment variables...\n");

    let mut missing = Vec::new();
    for (var, description) in REQUIRED {
        match std::env::var(var).ok().filter(|v| !v.trim().is_empty()) {
            Some(value) => println!("{} {}: {}", "✔".green(), var.bold(), mask(&value)),
            None => {
                println!("{} {}: {}", "✘".red(), var.bold(), "NOT SET".red());
                missing.push(var);
            }
        }
        println!("   ({description})\n");
    }

    if missing.is_empty() {
        println!("{}", "All environment variables are set!".green().bold());
        println!("\nStart the server with:\n   cargo run --bin weather-chat");
        return ExitCode::SUCCESS;
    }

    println!("{}", "Some environment variables are missing.".yellow().bold());
    println!("\nTo set them (Linux/Mac):");
    for var in &missing {
        println!("   export {var}=\"your-value\"");
    }
    println!("\nTo set them (Windows PowerShell):");
    for var in &missing {
        println!("   $env:{var}=\"your-value\"");
    }
    ExitCode::FAILURE
}
