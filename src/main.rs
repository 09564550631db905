fn main() {
    biosort_lib::run()
}
