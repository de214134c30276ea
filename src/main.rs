fn main() -> std::process::ExitCode {
    docpair_lib::run()
}
