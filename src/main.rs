fn main() {
    sage_gateway::run();
}
