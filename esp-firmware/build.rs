// Build-Script: Wird vor dem Kompilieren ausgeführt
// Konfiguriert den Linker für ESP32-C6 Embedded Rust

use std::env;
use std::fs;
use std::path::PathBuf;

/// Pflicht-Variablen: ohne sie bricht `env!` in config.rs den Build ab
const REQUIRED_VARS: [&str; 4] = ["WIFI_SSID", "WIFI_PASSWORD", "MQTT_BROKER", "OTA_PASSWORD"];

/// Optionale Variablen mit Default-Wert
const DEFAULTED_VARS: [(&str, &str); 3] = [
    ("MQTT_ROOT", "Home/"),
    ("MQTT_DEVICE", "MediaLight/"),
    ("OTA_HOSTNAME", "MEDIALIGHT"),
];

/// Ports mit Default-Wert, landen geprüft als `u16`-Konstanten in `ports.rs`
const PORT_VARS: [(&str, &str); 2] = [("MQTT_PORT", "1883"), ("OTA_PORT", "8266")];

fn main() {
    // Lade .env file für WiFi-, MQTT- und OTA-Konfiguration
    // Fehler ignorieren wenn .env nicht existiert (dann müssen ENV vars gesetzt sein)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("⚠️  .env file nicht gefunden: {}", e);
        eprintln!("   Setze WIFI_SSID, WIFI_PASSWORD, MQTT_BROKER und OTA_PASSWORD als Environment-Variablen");
    }
    println!("cargo:rerun-if-changed=.env");

    // Gebe Konfiguration an Rust-Compiler weiter
    // Die Werte werden zur Compile-Zeit in den Code eingebacken
    for name in REQUIRED_VARS {
        println!("cargo:rerun-if-env-changed={}", name);
        if let Ok(value) = env::var(name) {
            println!("cargo:rustc-env={}={}", name, value);
        }
    }
    for (name, default) in DEFAULTED_VARS {
        println!("cargo:rerun-if-env-changed={}", name);
        let value = env::var(name).unwrap_or_else(|_| default.to_string());
        println!("cargo:rustc-env={}={}", name, value);
    }
    write_ports();

    // Registriere hilfsbereiten Error-Handler für Linker-Fehler
    linker_be_nice();

    // Füge Linker-Skripte hinzu:

    // 1. defmt.x - defmt Logging-Support
    //    Definiert Symbole für defmt's binäres Log-Format
    println!("cargo:rustc-link-arg=-Tdefmt.x");

    // 2. linkall.x - ESP32 Memory-Layout
    //    WICHTIG: Muss als LETZTES kommen (sonst Probleme mit flip-link)
    //    Definiert Flash/RAM-Layout und Startup-Code
    println!("cargo:rustc-link-arg=-Tlinkall.x");
}

// Ports prüfen und als Konstanten nach $OUT_DIR/ports.rs schreiben
// (config.rs bindet die Datei per include! ein)
fn write_ports() {
    let mut source = String::new();
    for (name, default) in PORT_VARS {
        println!("cargo:rerun-if-env-changed={}", name);
        let value = env::var(name).unwrap_or_else(|_| default.to_string());
        let port = match value.trim().parse::<u16>() {
            Ok(port) if port > 0 => port,
            _ => panic!("{} muss ein Port zwischen 1 und 65535 sein, ist aber '{}'", name, value),
        };
        source.push_str(&format!("pub const {}: u16 = {};\n", name, port));
    }

    let out = PathBuf::from(env::var_os("OUT_DIR").expect("OUT_DIR nicht gesetzt"));
    fs::write(out.join("ports.rs"), source).expect("ports.rs konnte nicht geschrieben werden");
}

// Error-Handler: Zeigt hilfreiche Tipps bei Linker-Fehlern
// Wird vom Linker als "--error-handling-script" aufgerufen
fn linker_be_nice() {
    let args: Vec<String> = std::env::args().collect();

    // Wenn vom Linker aufgerufen (mit Error-Typ und Symbol-Name)
    if args.len() > 1 {
        let kind = &args[1]; // Fehler-Typ (z.B. "undefined-symbol")
        let what = &args[2]; // Symbol-Name (z.B. "_defmt_...")

        match kind.as_str() {
            // Undefiniertes Symbol gefunden
            "undefined-symbol" => match what.as_str() {
                what if what.starts_with("_defmt_") => {
                    eprintln!();
                    eprintln!(
                        "💡 `defmt` not found - make sure `defmt.x` is added as a linker script and you have included `use defmt_rtt as _;`"
                    );
                    eprintln!();
                }
                "_stack_start" => {
                    eprintln!();
                    eprintln!("💡 Is the linker script `linkall.x` missing?");
                    eprintln!();
                }
                what if what.starts_with("esp_rtos_") => {
                    eprintln!();
                    eprintln!(
                        "💡 `esp-radio` has no scheduler enabled. Make sure you have initialized `esp-rtos` or provided an external scheduler."
                    );
                    eprintln!();
                }
                "embedded_test_linker_file_not_added_to_rustflags" => {
                    eprintln!();
                    eprintln!(
                        "💡 `embedded-test` not found - make sure `embedded-test.x` is added as a linker script for tests"
                    );
                    eprintln!();
                }
                "free"
                | "malloc"
                | "calloc"
                | "get_free_internal_heap_size"
                | "malloc_internal"
                | "realloc_internal"
                | "calloc_internal"
                | "free_internal" => {
                    eprintln!();
                    eprintln!(
                        "💡 Did you forget the `esp-alloc` dependency or didn't enable the `compat` feature on it?"
                    );
                    eprintln!();
                }
                _ => (),
            },
            // we don't have anything helpful for "missing-lib" yet
            _ => {
                std::process::exit(1);
            }
        }

        std::process::exit(0);
    }

    println!(
        "cargo:rustc-link-arg=--error-handling-script={}",
        std::env::current_exe().unwrap().display()
    );
}
