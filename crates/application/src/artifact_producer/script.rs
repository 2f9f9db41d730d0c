use std::fmt::Write as _;

use prunevault_domain::{RemoteLayout, SqlIdentifier};

use super::PlannedDump;
use crate::backup_ports::DumpTool;

/// Quotes a value as a single POSIX shell word.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Generated shell script for one remote run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteScript {
    /// Script file name, relative to the remote root.
    pub file_name: String,
    /// Script text.
    pub body: String,
}

impl RemoteScript {
    /// Renders the script for a plan.
    ///
    /// The output depends only on the layout, the dataset and the plan, so
    /// the same run always produces the same text. The script removes any
    /// leftovers of an earlier attempt with the same stamp before dumping.
    #[must_use]
    pub fn render(
        dump_tool: &dyn DumpTool,
        dataset: &SqlIdentifier,
        layout: &RemoteLayout,
        plan: &[PlannedDump],
    ) -> Self {
        let stamp = layout.stamp();
        let work_dir = layout.work_dir_name();
        let archive = layout.archive_name();
        let option_file = layout.option_file_name();

        let mut body = String::new();
        body.push_str("#!/bin/sh\n");
        let _ = writeln!(body, "# prunevault remote dump, run {stamp}");
        body.push_str("set -eu\n");
        body.push_str("umask 077\n");
        let _ = writeln!(body, "cd {}", shell_quote(layout.root()));
        let _ = writeln!(body, "trap {} EXIT", shell_quote(&format!("rm -f {option_file}")));
        let _ = writeln!(
            body,
            "rm -rf {} {}",
            shell_quote(&work_dir),
            shell_quote(&archive)
        );
        let _ = writeln!(body, "mkdir -p {}", shell_quote(&work_dir));

        for dump in plan {
            match &dump.partition {
                Some(spec) => {
                    let cutoff = dump
                        .request
                        .predicate
                        .as_ref()
                        .map(|predicate| predicate.cutoff().sql_literal())
                        .unwrap_or_default();
                    let _ = writeln!(
                        body,
                        "# {}: retain {} days, rows older than {cutoff}",
                        spec.name(),
                        spec.retention_days()
                    );
                }
                None => body.push_str("# full dataset\n"),
            }

            let output = format!(
                "{work_dir}/{}",
                dump.request.scope.dump_file_name(dataset, stamp)
            );
            let _ = writeln!(
                body,
                "{} > {}",
                dump_tool.shell_command(&dump.request, &option_file),
                shell_quote(&output)
            );
        }

        let _ = writeln!(
            body,
            "zip -q -r {} {}",
            shell_quote(&archive),
            shell_quote(&work_dir)
        );

        Self {
            file_name: layout.script_name(),
            body,
        }
    }
}
