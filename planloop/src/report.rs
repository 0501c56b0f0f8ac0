//! Terminal progress output for a running loop.
//!
//! Separate from tracing: this is product output on stdout, rendered with
//! colors and silenced entirely by `--quiet`.

use std::fmt::Write as _;

use colored::Colorize;

use crate::core::memory::Memory;
use crate::core::types::{State, Task};
use crate::orchestrator::LoopEvent;

const RULE_WIDTH: usize = 50;

/// Prints loop events as framed blocks.
#[derive(Debug, Clone)]
pub struct Reporter {
    wrap_width: usize,
}

impl Reporter {
    pub fn new(wrap_width: usize) -> Self {
        Self { wrap_width }
    }

    pub fn handle(&self, event: LoopEvent<'_>) {
        print!("{}", self.render(event));
    }

    pub fn render(&self, event: LoopEvent<'_>) -> String {
        match event {
            LoopEvent::Dispatch {
                state,
                agent,
                memory,
            } => render_dispatch(state, agent, memory),
            LoopEvent::TaskCompleted { task } => render_task_completed(task, self.wrap_width),
            LoopEvent::Completed { memory } => render_completed(memory, self.wrap_width),
        }
    }
}

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

fn render_dispatch(state: State, agent: &str, memory: &Memory) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", rule().cyan());
    let _ = writeln!(out, "{} {}", "Current State:".cyan(), state.as_str().to_uppercase());
    let _ = writeln!(out, "{} {}", "Agent:".cyan(), agent);
    if let Some(task) = memory.current_task() {
        let _ = writeln!(out, "{} {}", "Current Task:".cyan(), task.description);
    }
    let _ = writeln!(out, "{}", "Task List:".cyan());
    for task in memory.task_list() {
        let mark = if task.is_resolved() {
            "[✓]".green()
        } else {
            "[ ]".yellow()
        };
        let _ = writeln!(out, "  {} {}. {}", mark, task.id, task.description);
    }
    let _ = writeln!(out, "{}", rule().cyan());
    out
}

fn render_task_completed(task: &Task, width: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{} {}", "Task Completed:".green(), task.description);
    let result = task.result.as_deref().unwrap_or_default();
    let _ = writeln!(out, "{}", "Result:".green());
    let _ = writeln!(out, "{}", wrap_text(result, width));
    out
}

fn render_completed(memory: &Memory, width: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", rule().green());
    let _ = writeln!(out, "{}", "Objective Completed!".green().bold());
    let _ = writeln!(out, "{}", rule().green());
    let _ = writeln!(out, "{}", "Final Response:".green());
    let _ = writeln!(
        out,
        "{}",
        wrap_text(memory.final_response().unwrap_or_default(), width)
    );
    out
}

/// Greedy word wrap at `width` columns. Existing line breaks are kept; words
/// longer than `width` stay on a line of their own.
pub fn wrap_text(text: &str, width: usize) -> String {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        let mut line_width = 0;
        for word in paragraph.split_whitespace() {
            let word_width = word.chars().count();
            if line_width > 0 && line_width + 1 + word_width > width {
                lines.push(std::mem::take(&mut line));
                line_width = 0;
            }
            if line_width > 0 {
                line.push(' ');
                line_width += 1;
            }
            line.push_str(word);
            line_width += word_width;
        }
        lines.push(line);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reconcile::{apply_executor_output, apply_planner_output};
    use crate::core::types::{CompletedTask, ExecutorOutput, PlannerOutput};

    fn memory_with_tasks() -> Memory {
        let mut memory = Memory::new("X");
        for description in ["research A", "research B"] {
            apply_planner_output(
                &mut memory,
                PlannerOutput {
                    is_complete: false,
                    next_task: Some(description.to_string()),
                    final_response: None,
                },
            )
            .expect("plan");
            if description == "research A" {
                apply_executor_output(
                    &mut memory,
                    ExecutorOutput {
                        completed_task: CompletedTask {
                            id: 1,
                            description: description.to_string(),
                            result: "A found".to_string(),
                        },
                    },
                )
                .expect("execute");
            }
        }
        memory
    }

    #[test]
    fn wrap_breaks_on_word_boundaries() {
        let text = "one two three four five";
        assert_eq!(wrap_text(text, 9), "one two\nthree\nfour five");
    }

    #[test]
    fn wrap_keeps_long_words_and_line_breaks() {
        let long = "x".repeat(30);
        let text = format!("{long} tail\nnext");
        assert_eq!(wrap_text(&text, 20), format!("{long}\ntail\nnext"));
        assert_eq!(wrap_text("", 20), "");
    }

    #[test]
    fn dispatch_block_lists_tasks_with_marks() {
        colored::control::set_override(false);
        let memory = memory_with_tasks();

        let out = Reporter::new(80).render(LoopEvent::Dispatch {
            state: State::Execute,
            agent: "executor",
            memory: &memory,
        });

        assert!(out.contains("Current State: EXECUTE"));
        assert!(out.contains("Agent: executor"));
        assert!(out.contains("Current Task: research B"));
        assert!(out.contains("[✓] 1. research A"));
        assert!(out.contains("[ ] 2. research B"));
        assert!(out.contains(&"=".repeat(RULE_WIDTH)));
    }

    #[test]
    fn dispatch_block_omits_current_task_while_planning() {
        colored::control::set_override(false);
        let memory = Memory::new("X");

        let out = Reporter::new(80).render(LoopEvent::Dispatch {
            state: State::Plan,
            agent: "planner",
            memory: &memory,
        });

        assert!(out.contains("Current State: PLAN"));
        assert!(!out.contains("Current Task"));
        assert!(!out.contains("None"));
        assert!(out.contains("Task List:"));
    }

    #[test]
    fn completion_block_wraps_final_response() {
        colored::control::set_override(false);
        let mut memory = Memory::new("X");
        apply_planner_output(
            &mut memory,
            PlannerOutput {
                is_complete: true,
                next_task: None,
                final_response: Some("word ".repeat(30)),
            },
        )
        .expect("complete");

        let out = Reporter::new(20).render(LoopEvent::Completed { memory: &memory });

        assert!(out.contains("Objective Completed!"));
        assert!(out.contains("Final Response:"));
        assert!(out.lines().all(|line| line.chars().count() <= RULE_WIDTH));
        assert!(out.lines().filter(|line| line.starts_with("word")).count() > 1);
    }

    #[test]
    fn task_block_shows_result() {
        colored::control::set_override(false);
        let memory = memory_with_tasks();

        let out = Reporter::new(80).render(LoopEvent::TaskCompleted {
            task: &memory.task_list()[0],
        });

        assert!(out.contains("Task Completed: research A"));
        assert!(out.contains("A found"));
    }
}
