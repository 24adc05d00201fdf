use std::collections::BTreeMap;

fn value<'a>(values: &'a BTreeMap<String, String>, key: &str) -> &'a str {
    values.get(key).map(String::as_str).unwrap_or("--")
}

fn seconds(raw: &str) -> String {
    if raw.chars().all(|c| c.is_ascii_digit()) {
        format!("{}s ago", raw)
    } else {
        raw.to_string()
    }
}

pub fn print_status(values: &BTreeMap<String, String>) {
    println!("      wakewatch Status      ");

    if values.is_empty() {
        println!("No data in status file\n");
        return;
    }

    println!("Daemon: pid {}\n", value(values, "daemon.pid"));

    println!("  Wake lock");
    println!("    Status:      {}", value(values, "wake.status"));
    println!("    Interrupts:  {}", value(values, "wake.interrupts"));
    println!("    Last lost:   {}", value(values, "wake.interrupt_age"));
    println!();
    println!("  GPS");
    println!("    Fixes:       {}", value(values, "gps.fixes"));
    println!("    Interrupts:  {}", value(values, "gps.interrupts"));
    println!("    Fix age:     {}", seconds(value(values, "gps.fix_age")));

    println!();
}

pub fn print_daemon_stopped() {
    println!("      wakewatch Status      ");
    println!(" Daemon: Not running\n");
}

pub fn print_success(message: &str) {
    println!(" {}", message);
}

pub fn print_error(message: &str) {
    eprintln!(" Error: {}", message);
}
