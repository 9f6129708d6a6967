use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, NamedTempFile};

const XDP_PASS: [u8; 16] = [
    0xb7, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, // r0 = XDP_PASS
    0x95, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // exit
];

fn pinloader() -> Command {
    Command::cargo_bin("ebpf-pinloader").unwrap()
}

/// Writes a little-endian ELF64 relocatable object holding `sections`
fn write_object(dir: &Path, sections: &[(&str, &[u8])]) -> PathBuf {
    let mut shstrtab = vec![0u8];
    let mut names = Vec::new();
    for (name, _) in sections {
        names.push(shstrtab.len() as u32);
        shstrtab.extend_from_slice(name.as_bytes());
        shstrtab.push(0);
    }
    let shstrtab_name = shstrtab.len() as u32;
    shstrtab.extend_from_slice(b".shstrtab\0");

    let mut body = Vec::new();
    let mut offsets = Vec::new();
    for (_, data) in sections {
        offsets.push(64 + body.len() as u64);
        body.extend_from_slice(data);
    }
    let shstrtab_off = 64 + body.len() as u64;
    body.extend_from_slice(&shstrtab);
    while body.len() % 8 != 0 {
        body.push(0);
    }
    let shnum = sections.len() as u16 + 2;

    let mut out = vec![0x7f, b'E', b'L', b'F', 2, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0];
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&247u16.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&[0u8; 16]);
    out.extend_from_slice(&(64 + body.len() as u64).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    for half in [64u16, 0, 0, 64, shnum, shnum - 1] {
        out.extend_from_slice(&half.to_le_bytes());
    }
    out.extend_from_slice(&body);

    let mut shdr = |name: u32, kind: u32, offset: u64, size: u64| {
        out.extend_from_slice(&name.to_le_bytes());
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&[0u8; 16]);
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&[0u8; 8]);
        out.extend_from_slice(&8u64.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes());
    };
    shdr(0, 0, 0, 0);
    for (i, (_, data)) in sections.iter().enumerate() {
        shdr(names[i], 1, offsets[i], data.len() as u64);
    }
    shdr(shstrtab_name, 3, shstrtab_off, shstrtab.len() as u64);

    let path = dir.join("prog.o");
    std::fs::write(&path, out).unwrap();
    path
}

#[test]
fn test_version() {
    pinloader()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_lists_commands() {
    pinloader()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("create-map"))
        .stdout(predicate::str::contains("load"))
        .stdout(predicate::str::contains("pin-path"));
}

#[test]
fn test_pin_path_global_default() {
    pinloader()
        .args(["pin-path", "--name", "counters"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/sys/fs/bpf/tc/globals/counters"));
}

#[test]
fn test_pin_path_json_with_config() {
    let config = NamedTempFile::new().unwrap();
    std::fs::write(
        config.path(),
        "pin_root: /run/bpf\npin_category: xdp\n",
    )
    .unwrap();

    let output = pinloader()
        .arg("--config")
        .arg(config.path())
        .args(["--format", "json", "pin-path", "--name", "events"])
        .args(["--pin", "object", "--object", "firewall"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["path"], "/run/bpf/xdp/firewall/events");
    assert_eq!(value["mode"], "object");
}

#[test]
fn test_pin_path_object_needs_namespace() {
    pinloader()
        .args(["pin-path", "--name", "events", "--pin", "object"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("needs an object name"));
}

#[test]
fn test_bad_config_reports_location() {
    let config = NamedTempFile::new().unwrap();
    std::fs::write(
        config.path(),
        "log_size: 4096\npin_rot: /sys/fs/bpf\n",
    )
    .unwrap();

    pinloader()
        .arg("--config")
        .arg(config.path())
        .args(["pin-path", "--name", "counters"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"));
}

#[test]
fn test_create_map_name_too_long() {
    pinloader()
        .args(["create-map", "--type", "hash", "--key-size", "4"])
        .args(["--value-size", "4", "--max-entries", "8"])
        .args(["--name", "sixteen_chars_xx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at most 15"));
}

#[test]
fn test_create_map_zero_key_size() {
    pinloader()
        .args(["create-map", "--type", "array", "--key-size", "0"])
        .args(["--value-size", "4", "--max-entries", "8"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "key_size must be greater than zero",
        ));
}

#[test]
fn test_create_map_unknown_type() {
    pinloader()
        .args(["create-map", "--type", "ringbuf", "--key-size", "4"])
        .args(["--value-size", "4", "--max-entries", "8"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown map type"));
}

#[test]
fn test_create_map_custom_pin_needs_path() {
    pinloader()
        .args(["create-map", "--type", "hash", "--key-size", "4"])
        .args(["--value-size", "4", "--max-entries", "8"])
        .args(["--name", "counters", "--pin", "custom"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("explicit pin path"));
}

#[test]
fn test_load_empty_section() {
    let dir = tempdir().unwrap();
    let object = write_object(dir.path(), &[("xdp", &[][..])]);

    pinloader()
        .arg("load")
        .arg("--object")
        .arg(&object)
        .args(["--section", "xdp", "--type", "xdp"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("instruction blob is empty"));
}

#[test]
fn test_load_misaligned_section() {
    let dir = tempdir().unwrap();
    let object = write_object(dir.path(), &[("xdp", &XDP_PASS[..12])]);

    pinloader()
        .arg("load")
        .arg("--object")
        .arg(&object)
        .args(["--section", "xdp", "--type", "xdp"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a multiple of the 8-byte"));
}

#[test]
fn test_load_unknown_type() {
    let dir = tempdir().unwrap();
    let object = write_object(dir.path(), &[("xdp", &XDP_PASS[..])]);

    pinloader()
        .arg("load")
        .arg("--object")
        .arg(&object)
        .args(["--section", "xdp", "--type", "lwt_in"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown program type"));
}

#[test]
fn test_load_missing_section() {
    let dir = tempdir().unwrap();
    let object = write_object(dir.path(), &[("xdp", &XDP_PASS[..])]);

    pinloader()
        .arg("load")
        .arg("--object")
        .arg(&object)
        .args(["--section", "classifier", "--type", "tc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_load_empty_license_section_uses_config() {
    let dir = tempdir().unwrap();
    let object = write_object(
        dir.path(),
        &[("xdp", &XDP_PASS[..]), ("license", &b"\0"[..])],
    );

    // Without CAP_BPF the kernel still refuses the load, but only after
    // the license has been accepted.
    pinloader()
        .arg("load")
        .arg("--object")
        .arg(&object)
        .args(["--section", "xdp", "--type", "xdp"])
        .assert()
        .stderr(predicate::str::contains("invalid license string").not());
}

#[test]
fn test_load_missing_object() {
    pinloader()
        .args(["load", "--object", "nonexistent.o"])
        .args(["--section", "xdp", "--type", "xdp"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
#[ignore = "needs CAP_BPF and a bpffs mount"]
fn test_load_and_pin_xdp() {
    let dir = tempdir().unwrap();
    let object = write_object(
        dir.path(),
        &[("xdp", &XDP_PASS[..]), ("license", &b"GPL\0"[..])],
    );
    let pin = PathBuf::from(format!(
        "/sys/fs/bpf/pinloader-test-{}/prog",
        std::process::id()
    ));

    pinloader()
        .arg("load")
        .arg("--object")
        .arg(&object)
        .args(["--section", "xdp", "--type", "xdp", "--name", "pass"])
        .arg("--pin-path")
        .arg(&pin)
        .assert()
        .success()
        .stdout(predicate::str::contains("XDP"));

    assert!(pin.exists());
    std::fs::remove_file(&pin).unwrap();
    if let Some(parent) = pin.parent() {
        std::fs::remove_dir(parent).unwrap();
    }
}
