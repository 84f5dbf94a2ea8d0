fn main() {
    // Delegate to CLI runner; this is the only place exit codes are decided.
    if let Err(err) = igfollow::cli::run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
