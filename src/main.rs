fn main() {
    if let Err(err) = mermaid_forge::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
