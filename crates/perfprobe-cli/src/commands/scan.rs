//! `perfprobe scan`: hardware identity and which probe backends exist here.

use perfprobe_core::{DEFAULT_TIMEOUT, Device, Inventory, Probe, scenario};

pub fn run() {
    let inventory = Inventory::collect(DEFAULT_TIMEOUT);
    println!("Platform: {} ({})", inventory.os, inventory.arch);
    print_devices("CPU", &inventory.cpus);
    print_devices("GPU", &inventory.gpus);
    println!();

    let mut available = 0;
    let mut total = 0;
    for s in scenario::all() {
        println!("{} — {}", s.name, s.description);
        for probe in s.probes() {
            total += 1;
            let info = probe.info();
            let mark = if probe.is_available() {
                available += 1;
                "\u{2705}"
            } else {
                "\u{274C}"
            };
            println!(
                "  {mark} {:<22} {:<11} {:<5} {}",
                info.name, info.kind, info.unit, info.description
            );
        }
        println!();
    }

    println!("{available}/{total} probe backend(s) available on this machine.");
}

fn print_devices(label: &str, devices: &[Device]) {
    if devices.is_empty() {
        println!("  {label}: not detected");
    }
    for device in devices {
        println!("  {}", device_line(label, device));
    }
}

fn device_line(label: &str, device: &Device) -> String {
    match device.vendor {
        Some(vendor) => format!("{label}: {} [{vendor}]", device.name),
        None => format!("{label}: {}", device.name),
    }
}
