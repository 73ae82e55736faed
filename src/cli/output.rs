//! Colored output helpers for CLI
//!
//! Consistent terminal output for the ee-scout CLI, plus renderers for task
//! trees and research reports.

use owo_colors::OwoColorize;

use crate::types::{FinalResult, Task, TaskStatus, TaskTree, TrlBand};

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the ee-scout banner
    pub fn banner(&self) {
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));
        if self.colored {
            println!(
                "\n   {} {}\n   {}\n",
                "ee-scout".bright_cyan().bold(),
                version.dimmed(),
                "Recursive research for electrical engineering".bright_white()
            );
        } else {
            println!(
                "\n   ee-scout {}\n   Recursive research for electrical engineering\n",
                version
            );
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a file creation message
    pub fn created(&self, file_type: &str, path: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "✓".green().bold(),
                file_type.dimmed(),
                path.bright_white()
            );
        } else {
            println!("  [CREATED] {} {}", file_type, path);
        }
    }

    /// Print a file skipped message
    pub fn skipped(&self, path: &str, reason: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "○".yellow(),
                path.dimmed(),
                format!("({})", reason).yellow()
            );
        } else {
            println!("  [SKIPPED] {} ({})", path, reason);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a subheader
    pub fn subheader(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.cyan().bold());
        } else {
            println!("\n  --- {} ---", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a list item
    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {}", message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Print a command suggestion
    pub fn command(&self, cmd: &str) {
        if self.colored {
            println!("     {}", format!("$ {}", cmd).bright_cyan());
        } else {
            println!("     $ {}", cmd);
        }
    }

    /// Print completion message
    pub fn complete(&self, message: &str) {
        if self.colored {
            println!("\n  {}", message.bright_green().bold());
        } else {
            println!("\n  [DONE] {}", message);
        }
    }

    /// Print a table header row
    pub fn table_header(&self, columns: &[(&str, usize)]) {
        let header = row(columns.iter().map(|(c, w)| (*c, *w)));
        let width: usize = columns.iter().map(|(_, w)| w + 1).sum();
        if self.colored {
            println!("    {}", header.bright_white().bold());
            println!("    {}", "─".repeat(width).dimmed());
        } else {
            println!("    {}", header);
            println!("    {}", "-".repeat(width));
        }
    }

    /// Print a table row
    pub fn table_row(&self, values: &[(&str, usize)]) {
        println!("    {}", row(values.iter().map(|(v, w)| (*v, *w))));
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }

    /// Print a task tree, one task per line, indented by depth.
    pub fn task_tree(&self, tree: &TaskTree) {
        self.header("Task Tree");
        self.kv("query", &tree.query);
        self.kv("topic", &tree.topic);
        self.kv("strategy", &format!("{:?}", tree.strategy).to_lowercase());
        if let Some(filter) = &tree.region_filter {
            self.kv("regions", &filter.to_string());
        }
        self.kv(
            "shape",
            &format!(
                "{} tasks, depth {}, widest fan-out {}",
                tree.len(),
                tree.depth(),
                tree.widest_fanout()
            ),
        );
        self.newline();
        for task in &tree.tasks {
            self.task_line(task);
        }
    }

    fn task_line(&self, task: &Task) {
        let indent = "  ".repeat(task.depth);
        let thread = task.thread.map(|t| t.as_str()).unwrap_or("-");
        let status = status_label(task.status);
        if self.colored {
            let category = task.category.as_str();
            let category = if task.is_leaf() {
                category.bright_white().to_string()
            } else {
                category.cyan().bold().to_string()
            };
            println!(
                "    {}{} {} {} {}",
                indent,
                format!("#{}", task.id).dimmed(),
                category,
                task.query_fragment,
                format!("[{} | {}]", thread, status).dimmed()
            );
        } else {
            println!(
                "    {}#{} {} {} [{} | {}]",
                indent, task.id, task.category, task.query_fragment, thread, status
            );
        }
    }

    /// Print a research report: ranked entities, sections, edges, failures.
    pub fn report(&self, result: &FinalResult) {
        self.header("Research Report");
        self.kv("query", &result.query);
        self.kv("run", &result.run_id.to_string());
        self.kv("strategy", &format!("{:?}", result.strategy).to_lowercase());
        let stats = &result.stats;
        self.kv(
            "tasks",
            &format!(
                "{} total, {} done, {} failed, {} cache hits, {} ms",
                stats.tasks_total,
                stats.tasks_done,
                stats.tasks_failed,
                stats.cache_hits,
                stats.duration_ms
            ),
        );
        if result.degraded {
            self.warning("Partial result: some subtasks failed or timed out");
        }

        self.subheader("Ranked Entities");
        if result.ranked.is_empty() {
            self.info("No entities found");
        } else {
            let columns = [("#", 4), ("Entity", 32), ("TRL", 5), ("Score", 7), ("Title", 40)];
            self.table_header(&columns);
            for (rank, entity) in result.ranked.iter().enumerate() {
                let rank = (rank + 1).to_string();
                let trl = entity.trl.map(|t| t.to_string()).unwrap_or_else(|| "-".into());
                let score = format!("{:.2}", entity.relevance_score);
                self.table_row(&[
                    (rank.as_str(), 4),
                    (entity.natural_key.as_str(), 32),
                    (trl.as_str(), 5),
                    (score.as_str(), 7),
                    (entity.title(), 40),
                ]);
            }
        }

        if !result.sections.is_empty() {
            self.subheader("Sections");
            for (category, keys) in &result.sections {
                self.kv(category.as_str(), &keys.join(", "));
            }
        }

        if !stats.per_trl_band.is_empty() {
            self.subheader("Readiness");
            for band in TrlBand::ALL {
                if let Some(count) = stats.per_trl_band.get(&band) {
                    self.kv(band.as_str(), &count.to_string());
                }
            }
        }

        if !result.relationships.is_empty() {
            self.subheader("Relationships");
            for rel in &result.relationships {
                self.list_item(&format!("{} -[{}]-> {}", rel.from, rel.kind, rel.to));
            }
        }

        if !result.failures.is_empty() {
            self.subheader("Failures");
            for failure in &result.failures {
                self.list_item(&format!(
                    "#{} {} \"{}\": {}",
                    failure.task_id, failure.category, failure.query_fragment, failure.failure.message
                ));
            }
        }
    }
}

fn status_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::Running => "running",
        TaskStatus::Done => "done",
        TaskStatus::Failed => "failed",
    }
}

/// Pad or truncate each cell to its width.
fn row<'a>(cells: impl Iterator<Item = (&'a str, usize)>) -> String {
    cells
        .map(|(value, width)| {
            let mut cell: String = value.chars().take(width).collect();
            let len = cell.chars().count();
            cell.extend(std::iter::repeat_n(' ', width - len));
            cell
        })
        .collect::<Vec<_>>()
        .join(" ")
}
