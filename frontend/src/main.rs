fn main() {
    ledgerdesk_frontend::run();
}
