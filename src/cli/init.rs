//! Init command implementation
//!
//! Scaffolds an ee-scout workspace: `scout.toml`, a `data/` directory for
//! store snapshots and, unless disabled, sample JSON catalogs wired up as
//! the source for every leaf category.

use super::output::Output;
use std::fs;
use std::path::Path;

/// Result of the init operation
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// Workspace already exists (scout.toml found)
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: std::path::PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// Skip the sample catalogs and their `[sources.*]` tables
    pub no_examples: bool,
    /// Host address for the server
    pub host: String,
    /// Port for the server
    pub port: u16,
}

/// Sample catalog file per source category key
const CATALOGS: &[(&str, &str, &str)] = &[
    ("literature", "catalogs/literature.json", LITERATURE_JSON),
    ("patent", "catalogs/patents.json", PATENTS_JSON),
    ("datasheet", "catalogs/datasheets.json", DATASHEETS_JSON),
    ("supply-chain", "catalogs/supply-chain.json", SUPPLY_CHAIN_JSON),
    ("component", "catalogs/components.json", COMPONENTS_JSON),
];

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing ee-scout workspace");

    let base_path = &config.path;

    let config_path = base_path.join("scout.toml");
    if config_path.exists() && !config.force {
        output.warning("scout.toml already exists!");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    output.subheader("Creating directories");
    let mut directories = vec!["data"];
    if !config.no_examples {
        directories.push("catalogs");
    }
    for dir in directories {
        let dir_path = base_path.join(dir);
        if dir_path.exists() {
            output.skipped(dir, "already exists");
            continue;
        }
        if let Err(e) = fs::create_dir_all(&dir_path) {
            output.error(&format!("Failed to create {}: {}", dir, e));
            return InitResult::Error(e.to_string());
        }
        output.created("directory", dir);
    }

    output.subheader("Creating configuration files");
    if let Err(e) = write_file(&config_path, &generate_scout_toml(&config), config.force) {
        output.error(&format!("Failed to create scout.toml: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", "scout.toml");

    if !config.no_examples {
        output.subheader("Creating sample catalogs");
        for (_, file, content) in CATALOGS {
            if let Err(e) = write_file(&base_path.join(file), content, config.force) {
                output.error(&format!("Failed to create {}: {}", file, e));
                return InitResult::Error(e.to_string());
            }
            output.created("catalog", file);
        }
    }

    let gitignore_path = base_path.join(".gitignore");
    if !gitignore_path.exists() {
        match write_file(&gitignore_path, GITIGNORE, false) {
            Ok(()) => output.created("file", ".gitignore"),
            Err(e) => output.warning(&format!("Failed to create .gitignore: {}", e)),
        }
    }

    output.complete("ee-scout workspace initialized");

    output.header("Next Steps");
    output.info("Plan a query:");
    output.command("ee-scout plan \"GaN power ICs, 48V automotive, EU\"");
    output.info("Run it:");
    output.command("ee-scout research \"GaN power ICs, 48V automotive, EU\"");
    output.info("Or start the API server:");
    output.command("ee-scout serve");

    output.hint(&format!(
        "Server will be available at http://{}:{}/api",
        config.host, config.port
    ));

    InitResult::Success
}

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(()); // Keep existing files unless forced
    }
    fs::write(path, content)
}

fn generate_scout_toml(config: &InitConfig) -> String {
    let mut toml = format!(
        r#"# ee-scout configuration
# Every value below is optional; the defaults are shown.

[server]
host = "{host}"
port = {port}
log_level = "info"

[planner]
default_max_depth = 2
default_max_fanout = 4
max_depth_limit = 4
max_fanout_limit = 8

[orchestrator]
max_concurrent_tasks = 8
task_timeout_secs = 30
tree_timeout_secs = 120
max_retries = 2
initial_backoff_ms = 100
max_backoff_ms = 2000
backoff_multiplier = 2.0

[cache]
enabled = true
ttl_secs = 3600
max_entries = 10000

[classifier]
min_evidence = 1

[store]
snapshot_path = "data/knowledge.json"
embedding_metric = "cosine"
"#,
        host = config.host,
        port = config.port
    );

    if config.no_examples {
        toml.push_str(
            r#"
# Bind a collaborator to each leaf category, e.g.
# [sources.datasheet]
# type = "http"
# endpoint = "http://localhost:9000/datasheets"
# timeout_secs = 10
"#,
        );
    } else {
        for (key, file, _) in CATALOGS {
            toml.push_str(&format!(
                "\n[sources.{}]\ntype = \"catalog\"\npath = \"{}\"\n",
                key, file
            ));
        }
    }
    toml
}

const GITIGNORE: &str = r#"# ee-scout
/data/

# Rust
/target/

# OS
.DS_Store
"#;

const LITERATURE_JSON: &str = r#"[
  {
    "title": "Monolithic GaN power ICs for 48V automotive DC-DC conversion",
    "summary": "Prototype demonstrated in a relevant environment; 48V to 12V bus converter at 2 MHz.",
    "published": "2023-05-10",
    "fields": { "doi": "10.1109/TPEL.2023.3271001" }
  },
  {
    "title": "Reliability of GaN HEMTs under automotive mission profiles",
    "summary": "Laboratory validation of dynamic RDS(on) drift; cites US11355410B2.",
    "published": "2022-11-02",
    "fields": { "doi": "10.1109/TED.2022.3210456" }
  },
  {
    "title": "AEC-Q101 qualification of GaN power devices",
    "summary": "Qualification test results against AEC-Q101 and ISO 26262 requirements.",
    "published": "2024-02-19",
    "fields": { "doi": "10.1109/IRPS.2024.1000123" }
  }
]
"#;

const PATENTS_JSON: &str = r#"[
  {
    "title": "GaN half-bridge with integrated gate driver",
    "summary": "Monolithic integration of driver and power stage for automotive converters.",
    "published": "2022-06-07",
    "fields": { "patent_number": "US11355410B2", "status": "granted" }
  },
  {
    "title": "Dead-time control for GaN power ICs",
    "published": "2023-09-14",
    "fields": { "patent_number": "EP4123456A1", "status": "pending" }
  }
]
"#;

const DATASHEETS_JSON: &str = r#"[
  {
    "key": "LMG3422R030",
    "title": "LMG3422R030 600V 30mOhm GaN FET with integrated driver",
    "manufacturer": "Texas Instruments",
    "fields": { "lifecycle": "active", "qualification": "AEC-Q100" }
  },
  {
    "key": "IGT60R070D1",
    "title": "CoolGaN 600V e-mode power transistor",
    "manufacturer": "Infineon",
    "fields": { "lifecycle": "active" }
  }
]
"#;

const SUPPLY_CHAIN_JSON: &str = r#"[
  {
    "key": "IGT60R070D1",
    "title": "IGT60R070D1 GaN power transistor availability",
    "manufacturer": "Infineon",
    "fields": {
      "distributors": [
        { "name": "Mouser", "stock": 2400 },
        { "name": "DigiKey", "stock": 1800 }
      ]
    }
  },
  {
    "key": "GS-065-011",
    "title": "GS-065-011 GaN E-HEMT availability",
    "manufacturer": "Acme Semi",
    "fields": { "stock": 120, "distributor_count": 1 }
  }
]
"#;

const COMPONENTS_JSON: &str = r#"[
  {
    "key": "LMG3422R030",
    "title": "LMG3422R030 GaN FET for automotive 48V power",
    "manufacturer": "Texas Instruments",
    "fields": { "lifecycle": "active", "alternatives": ["IGT60R070D1"] }
  },
  {
    "key": "IGT60R070D1",
    "title": "CoolGaN IGT60R070D1 power ICs for industrial and automotive",
    "manufacturer": "Infineon",
    "fields": { "lifecycle": "active" }
  }
]
"#;
