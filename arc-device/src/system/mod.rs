//! One [`crate::ArcSystem`] implementation per operating system.
//!
//! [`NativeSystem`] names the backend for the target the crate is built for.
#[cfg(all(unix, not(target_os = "macos")))]
pub mod linux;
#[cfg(target_os = "macos")]
pub mod macos;
#[cfg(windows)]
pub mod windows;

/// Builds the 32-bit control code the ARC drivers on Linux and macOS expect,
/// the ASCII tag `ARC` in the upper bytes and the command in the low byte.
pub const fn make_command(command: u32) -> u32 {
    0x41524300 | command
}

/// Joins two 32-bit ioctl words into the 64-bit value they carry, in native byte order.
pub fn join_words(words: [u32; 2]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes[..4].copy_from_slice(&words[0].to_ne_bytes());
    bytes[4..].copy_from_slice(&words[1].to_ne_bytes());
    u64::from_ne_bytes(bytes)
}

/// Splits a 64-bit value into two ioctl words. The inverse of [`join_words`].
pub fn split_words(value: u64) -> [u32; 2] {
    let bytes = value.to_ne_bytes();
    [
        u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        u32::from_ne_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
    ]
}

#[cfg(all(unix, not(target_os = "macos")))]
pub type NativeSystem = linux::LinuxSystem;
#[cfg(target_os = "macos")]
pub type NativeSystem = macos::MacSystem;
#[cfg(windows)]
pub type NativeSystem = windows::WindowsSystem;

#[test]
fn command_tag() {
    assert_eq!(make_command(0x1), 0x41524301);
    assert_eq!(make_command(0xC), 0x4152430C);
    assert_eq!(make_command(0x0).to_be_bytes()[..3], *b"ARC");
}

#[test]
fn address_words() {
    let address: u64 = 0x0000_7FFE_1234_5000;
    assert_eq!(join_words(split_words(address)), address);
    assert_eq!(join_words([0, 0]), 0);
}
