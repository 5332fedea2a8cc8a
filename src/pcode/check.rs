//! FileCheck-style test validation for `.pcode` files.
//!
//! A test file is an ordinary p-code source whose comments carry the test:
//! `; RUN:` lines name the driver flags and `; CHECK...` lines the expected
//! output, matched the way LLVM's FileCheck does.

use super::Program;
use crate::config::TranslatorConfig;
use crate::core::{RegisterMap, UseropLibrary};
use crate::driver::translate_units;

/// A CHECK directive extracted from a test file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckDirective {
    /// CHECK: pattern - Match on this or any later line
    Check(String),
    /// CHECK-LABEL: pattern - Start of a section
    CheckLabel(String),
    /// CHECK-NEXT: pattern - Match on the line right after the previous match
    CheckNext(String),
    /// CHECK-NOT: pattern - Must not appear before the next positive match
    CheckNot(String),
    /// COM: comment - Ignored
    Comment(String),
}

/// A RUN directive specifying how to execute the test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirective {
    pub command: String,
    pub args: Vec<String>,
}

impl RunDirective {
    /// Driver flags, without the `%s` input placeholder.
    pub fn flags(&self) -> impl Iterator<Item = &str> + '_ {
        self.args.iter().map(String::as_str).filter(|a| *a != "%s")
    }
}

/// Test specification extracted from a `.pcode` file.
#[derive(Debug)]
pub struct TestSpec {
    pub run_directives: Vec<RunDirective>,
    pub check_directives: Vec<CheckDirective>,
    /// The whole file; directives are comments to the parser.
    pub source: String,
}

impl TestSpec {
    pub fn parse(content: &str) -> Result<Self, String> {
        let mut run_directives = Vec::new();
        let mut check_directives = Vec::new();

        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            let Some(comment) = trimmed.strip_prefix(';') else {
                continue;
            };
            let comment = comment.trim_start();

            if let Some(cmd) = comment.strip_prefix("RUN:") {
                let parts: Vec<&str> = cmd.split_whitespace().collect();
                let Some((command, args)) = parts.split_first() else {
                    return Err(format!("line {}: empty RUN directive", idx + 1));
                };
                run_directives.push(RunDirective {
                    command: command.to_string(),
                    args: args.iter().map(|s| s.to_string()).collect(),
                });
            } else if let Some(pattern) = comment.strip_prefix("CHECK-LABEL:") {
                check_directives.push(CheckDirective::CheckLabel(pattern.trim().to_string()));
            } else if let Some(pattern) = comment.strip_prefix("CHECK-NEXT:") {
                check_directives.push(CheckDirective::CheckNext(pattern.trim().to_string()));
            } else if let Some(pattern) = comment.strip_prefix("CHECK-NOT:") {
                check_directives.push(CheckDirective::CheckNot(pattern.trim().to_string()));
            } else if let Some(pattern) = comment.strip_prefix("CHECK:") {
                check_directives.push(CheckDirective::Check(pattern.trim().to_string()));
            } else if let Some(text) = comment.strip_prefix("COM:") {
                check_directives.push(CheckDirective::Comment(text.trim().to_string()));
            } else if comment.starts_with("CHECK") {
                return Err(format!("line {}: unknown directive '{}'", idx + 1, comment));
            }
        }

        Ok(TestSpec {
            run_directives,
            check_directives,
            source: content.to_string(),
        })
    }
}

/// Runs `.pcode` tests against the built-in userops and registers.
pub struct TestRunner {
    verbose: bool,
    userops: UseropLibrary,
    registers: RegisterMap,
}

impl TestRunner {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            userops: UseropLibrary::builtin(),
            registers: RegisterMap::x86_64(),
        }
    }

    pub fn run_test(&self, spec: &TestSpec) -> Result<(), String> {
        if spec.run_directives.is_empty() {
            return Err("no RUN directive".to_string());
        }
        let program = Program::parse(&spec.source).map_err(|e| e.to_string())?;

        for run_dir in &spec.run_directives {
            let output = self.execute_command(&program, run_dir)?;
            if self.verbose {
                println!("{}", output);
            }
            self.validate_output(&output, &spec.check_directives)?;
        }

        Ok(())
    }

    fn execute_command(&self, program: &Program, run_dir: &RunDirective) -> Result<String, String> {
        let config = TranslatorConfig::from_flags(run_dir.flags())?;
        let result = translate_units(program, &self.userops, &self.registers, &config)
            .map_err(|e| e.to_string())?;
        Ok(result.render(config.print.stats))
    }

    /// Validate output against CHECK directives.
    pub fn validate_output(
        &self,
        output: &str,
        directives: &[CheckDirective],
    ) -> Result<(), String> {
        let lines: Vec<&str> = output.lines().collect();
        let mut line_idx = 0;
        let mut pending_not: Vec<&str> = Vec::new();

        // Lines in [from, to) must not contain any pending CHECK-NOT pattern.
        let check_nots = |pending: &mut Vec<&str>, from: usize, to: usize| -> Result<(), String> {
            for pattern in pending.drain(..) {
                if let Some(hit) = lines[from..to].iter().position(|l| l.contains(pattern)) {
                    return Err(format!(
                        "CHECK-NOT: pattern '{}' found at line {}",
                        pattern,
                        from + hit
                    ));
                }
            }
            Ok(())
        };

        for directive in directives {
            match directive {
                CheckDirective::Comment(_) => continue,

                CheckDirective::CheckNot(pattern) => pending_not.push(pattern),

                CheckDirective::Check(pattern) | CheckDirective::CheckLabel(pattern) => {
                    let kind = match directive {
                        CheckDirective::CheckLabel(_) => "CHECK-LABEL",
                        _ => "CHECK",
                    };
                    let found = lines
                        .iter()
                        .skip(line_idx)
                        .position(|line| line.contains(pattern.as_str()));
                    let Some(idx) = found else {
                        return Err(format!("{}: pattern '{}' not found in output", kind, pattern));
                    };
                    check_nots(&mut pending_not, line_idx, line_idx + idx)?;
                    line_idx += idx + 1;
                    if self.verbose {
                        println!("{}: '{}' found at line {}", kind, pattern, line_idx - 1);
                    }
                }

                CheckDirective::CheckNext(pattern) => {
                    let Some(line) = lines.get(line_idx) else {
                        return Err(format!("CHECK-NEXT: no more lines, expected '{}'", pattern));
                    };
                    if !line.contains(pattern.as_str()) {
                        return Err(format!(
                            "CHECK-NEXT: expected '{}' but got '{}'",
                            pattern, line
                        ));
                    }
                    check_nots(&mut pending_not, line_idx, line_idx)?;
                    line_idx += 1;
                }
            }
        }

        check_nots(&mut pending_not, line_idx, lines.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_directives() {
        let content = r#"; RUN: jitir %s --print-graph
; CHECK: unit entry: translated
; CHECK-NEXT: Graph for entry
; CHECK-NOT: WRITEBACK
; COM: This is a comment
unit entry {
  unique[0x0:8] = COPY RAX
}"#;

        let spec = TestSpec::parse(content).unwrap();
        assert_eq!(spec.run_directives.len(), 1);
        assert_eq!(
            spec.run_directives[0].flags().collect::<Vec<_>>(),
            vec!["--print-graph"]
        );
        assert_eq!(spec.check_directives.len(), 4);
        assert!(spec.source.contains("unit entry"));
    }

    #[test]
    fn test_unknown_directive_is_rejected() {
        let err = TestSpec::parse("; CHECK-SAME: x\n").unwrap_err();
        assert!(err.contains("line 1"));
    }

    #[test]
    fn test_check_matching() {
        let runner = TestRunner::new(false);
        let output = "unit a: translated\nGraph for a:\nValues:\n";

        let directives = vec![
            CheckDirective::CheckLabel("unit a".to_string()),
            CheckDirective::CheckNext("Graph for a".to_string()),
            CheckDirective::CheckNot("fallback".to_string()),
            CheckDirective::Check("Values".to_string()),
        ];

        runner.validate_output(output, &directives).unwrap();
    }

    #[test]
    fn test_check_next_failure() {
        let runner = TestRunner::new(false);
        let output = "Line 1\nLine 2\nLine 3\n";

        let directives = vec![
            CheckDirective::Check("Line 1".to_string()),
            CheckDirective::CheckNext("Line 3".to_string()),
        ];

        let result = runner.validate_output(output, &directives);
        assert!(result.unwrap_err().contains("CHECK-NEXT"));
    }

    #[test]
    fn test_check_not_failure() {
        let runner = TestRunner::new(false);
        let output = "a\nb\nc\n";

        let directives = vec![
            CheckDirective::Check("a".to_string()),
            CheckDirective::CheckNot("b".to_string()),
            CheckDirective::Check("c".to_string()),
        ];
        assert!(runner.validate_output(output, &directives).is_err());

        let trailing = vec![CheckDirective::CheckNot("c".to_string())];
        assert!(runner.validate_output(output, &trailing).is_err());
    }

    #[test]
    fn test_run_end_to_end() {
        let content = r#"; RUN: jitir %s --print-plan
; CHECK-LABEL: unit entry: translated, 2 ops, 1 removed
; CHECK: Plan for entry:
; CHECK-NEXT: INT_ADD
; CHECK-NEXT: WRITEBACK register[0x0:8]
unit entry {
  unique[0x0:8] = COPY RCX
  RAX = INT_ADD RAX, const[0x1:8]
}"#;
        let spec = TestSpec::parse(content).unwrap();
        TestRunner::new(false).run_test(&spec).unwrap();
    }
}
