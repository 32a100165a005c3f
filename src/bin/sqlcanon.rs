fn main() {
    sqlcanon::cli::run();
}
