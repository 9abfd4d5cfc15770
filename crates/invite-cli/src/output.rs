//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use invite_core::{Element, Page, Project};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a single project with its page/element tree
    pub fn print_project(&self, project: &Project) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:       {}", project.id);
                println!("UUID:     {}", project.uuid);
                println!("Name:     {}", project.name);
                println!(
                    "Modified: {}",
                    project.last_modified.format("%Y-%m-%d %H:%M")
                );

                println!();
                println!("── Pages ({}) ──", project.pages.len());
                for page in &project.pages {
                    print_page_tree(page);
                }
            }
            OutputFormat::Json => print_json(project),
            OutputFormat::Quiet => {
                println!("{}", project.id);
            }
        }
    }

    /// Print a list of projects
    pub fn print_projects(&self, projects: &[Project]) {
        match self.format {
            OutputFormat::Human => {
                if projects.is_empty() {
                    println!("No projects found.");
                    return;
                }
                for project in projects {
                    println!(
                        "{:>4} | {} | {} page(s) | {}",
                        project.id,
                        pad(&truncate(&project.name, 35), 35),
                        project.pages.len(),
                        project.last_modified.format("%Y-%m-%d %H:%M")
                    );
                }
                println!("\n{} project(s)", projects.len());
            }
            OutputFormat::Json => {
                let summaries: Vec<_> = projects
                    .iter()
                    .map(|p| {
                        serde_json::json!({
                            "id": p.id,
                            "uuid": p.uuid,
                            "name": p.name,
                            "lastModified": p.last_modified.timestamp_millis(),
                            "pages": p.pages.len(),
                        })
                    })
                    .collect();
                print_json(&summaries);
            }
            OutputFormat::Quiet => {
                for project in projects {
                    println!("{}", project.id);
                }
            }
        }
    }

    /// Print a page
    pub fn print_page(&self, page: &Page) {
        match self.format {
            OutputFormat::Human => print_page_tree(page),
            OutputFormat::Json => print_json(page),
            OutputFormat::Quiet => println!("{}", page.id),
        }
    }

    /// Print the id of something just created, with a human label
    pub fn print_created(&self, label: &str, id: &str, extra: serde_json::Value) {
        match self.format {
            OutputFormat::Human => println!("✓ Created {}: {}", label, id),
            OutputFormat::Json => {
                let mut value = serde_json::json!({"status": "success", "id": id});
                if let (Some(obj), serde_json::Value::Object(more)) = (value.as_object_mut(), extra) {
                    obj.extend(more);
                }
                println!("{}", value);
            }
            OutputFormat::Quiet => println!("{}", id),
        }
    }

    /// Print any serializable report (JSON) or a human summary line
    pub fn print_report<T: Serialize>(&self, human: &str, report: &T) {
        match self.format {
            OutputFormat::Human => println!("{}", human),
            OutputFormat::Json => print_json(report),
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a warning to stderr
    ///
    /// Stdout stays parseable in JSON mode; quiet mode prints nothing.
    pub fn warning(&self, message: &str) {
        if let Some(line) = warning_line(self.format, message) {
            eprintln!("{}", line);
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn warning_line(format: OutputFormat, message: &str) -> Option<String> {
    match format {
        OutputFormat::Human => Some(format!("Warning: {}", message)),
        OutputFormat::Json => {
            Some(serde_json::json!({"status": "warning", "message": message}).to_string())
        }
        OutputFormat::Quiet => None,
    }
}

fn print_page_tree(page: &Page) {
    println!("[{}] {} (template {})", page.id, page.name, page.template_id);
    if page.elements.is_empty() {
        println!("    (empty)");
    }
    for element in &page.elements {
        println!("    {}", describe_element(element));
    }
}

/// One-line summary of an element
fn describe_element(element: &Element) -> String {
    let frame = element.frame();
    let position = format!(
        "@{},{} {}x{}",
        frame.x, frame.y, frame.width, frame.height
    );
    match element {
        Element::Text(text) => format!(
            "{}  text   {}  \"{}\" {} {} {}",
            text.id,
            position,
            truncate_line(&text.text, 30),
            text.font_family,
            text.font_size,
            text.text_align
        ),
        Element::Image(image) => format!(
            "{}  image  {}  asset {}",
            image.id, position, image.src_asset_id
        ),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}

fn pad(s: &str, width: usize) -> String {
    format!("{:<width$}", s, width = width)
}
