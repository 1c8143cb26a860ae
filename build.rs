use std::path::Path;

fn main() {
    // Form page assets are embedded by rust-embed; rebuild when they change.
    println!("cargo:rerun-if-changed=static");

    if !Path::new("static/index.html").exists() {
        println!("cargo:warning=static/index.html not found, the form page will 404");
    }
}
