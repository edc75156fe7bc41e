fn main() {
    std::process::exit(amtool::run(std::env::args_os()));
}
