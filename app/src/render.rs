use courier_core::routes::flatten;
use courier_core::{ChatEvent, Citation, RouteNode};
use std::io::{self, Write};

/// Print a text increment immediately; citations are held for the footer.
pub fn print_event(event: &ChatEvent) -> io::Result<()> {
    if let ChatEvent::Text { text } = event {
        let mut stdout = io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()?;
    }
    Ok(())
}

pub fn format_sources(sources: &[Citation]) -> String {
    let mut out = String::new();
    for (idx, source) in sources.iter().enumerate() {
        out.push_str(&format!("[{}] {}", idx + 1, source.title));
        if let Some(url) = &source.url {
            out.push_str(&format!(" <{url}>"));
        }
        out.push('\n');
    }
    out
}

/// One line per navigable entry; grouped entries are indented under their group.
pub fn format_routes(table: &[RouteNode]) -> String {
    let mut out = String::new();
    for node in table {
        match node {
            RouteNode::Entry(entry) => {
                out.push_str(&format!("{:<32} {}\n", display_path(&entry.path), entry.label));
            }
            RouteNode::Group(group) => {
                out.push_str(&format!("{}\n", group.label));
                for entry in &group.routes {
                    out.push_str(&format!(
                        "  {:<30} {}\n",
                        display_path(&entry.path),
                        entry.label
                    ));
                }
            }
        }
    }
    out.push_str(&format!("({} routes)\n", flatten(table).count()));
    out
}

fn display_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}
