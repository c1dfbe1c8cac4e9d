// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

use std::{env, fmt::Write as _, fs, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-env-changed=NEURON_LINKER_SCRIPT");
    if let Ok(script) = env::var("NEURON_LINKER_SCRIPT") {
        println!("cargo:rustc-link-arg=-T{script}");
    }

    println!("cargo:rerun-if-env-changed=NEURON_SYMBOL_MAP");
    if env::var_os("CARGO_FEATURE_TRAP_SYMBOLS").is_some() {
        emit_symbol_table();
    }
}

/// Writes `trap_symbols.rs` from an `nm -n` style listing (`<hex addr> <type> <name>`).
/// Without a listing the table is empty and fatal reports fall back to blank names.
fn emit_symbol_table() {
    let mut symbols: Vec<(u64, String)> = Vec::new();
    if let Ok(path) = env::var("NEURON_SYMBOL_MAP") {
        println!("cargo:rerun-if-changed={path}");
        let listing = fs::read_to_string(&path).expect("NEURON_SYMBOL_MAP must be readable");
        for line in listing.lines() {
            let mut fields = line.split_whitespace();
            let (Some(addr), Some(kind), Some(name)) = (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            if !matches!(kind, "T" | "t" | "W" | "w") {
                continue;
            }
            if let Ok(addr) = u64::from_str_radix(addr, 16) {
                symbols.push((addr, name.to_string()));
            }
        }
    }
    symbols.sort_by_key(|(addr, _)| *addr);
    symbols.dedup_by_key(|(addr, _)| *addr);

    let mut out = String::from("pub static TRAP_SYMBOLS: &[(u32, &str)] = &[\n");
    for (addr, name) in &symbols {
        let _ = writeln!(out, "    (0x{:08x}, {:?}),", *addr as u32, name);
    }
    out.push_str("];\n");

    let dest = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR set by cargo")).join("trap_symbols.rs");
    fs::write(dest, out).expect("write trap_symbols.rs");
}
