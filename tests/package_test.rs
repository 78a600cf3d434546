#[test]
fn test_package_metadata() {
    assert_eq!(env!("CARGO_PKG_NAME"), "src");
    assert_eq!(env!("CARGO_PKG_VERSION"), "0.1.0");
    assert_eq!(env!("CARGO_PKG_AUTHORS"), "Tim von Hahn");
    assert_eq!(env!("CARGO_PKG_LICENSE"), "MIT");
    assert_eq!(
        env!("CARGO_PKG_DESCRIPTION"),
        "Understanding the inner workings of MIDI files with Python."
    );
}
