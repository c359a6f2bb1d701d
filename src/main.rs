fn main() {
    kips::init_logging();
    if let Err(err) = kips::run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
