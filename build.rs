// Copyright 2023 Remi Bernotavicius

fn main() {
    // The migrations are embedded into the binary, so it has to be rebuilt when they change.
    println!("cargo:rerun-if-changed=migrations/");
}
