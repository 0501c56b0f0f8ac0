//! End-to-end loop runs against scripted agents.

use planloop::agents::{Agent, AgentMap};
use planloop::core::memory::Memory;
use planloop::core::types::State;
use planloop::orchestrator::{LoopEvent, Orchestrator, OrchestratorError};
use planloop::report::Reporter;
use planloop::test_support::{ScriptedAgent, executed, plan_complete, plan_next};

#[test]
fn report_objective_runs_to_completion() {
    let planner = ScriptedAgent::new(
        "planner",
        vec![
            plan_next("Research AI advancements in 2022"),
            plan_next("Write the report"),
            plan_complete("Report on AI advancements in 2022"),
        ],
    );
    let executor = ScriptedAgent::new(
        "executor",
        vec![
            executed(1, "Research AI advancements in 2022", "Diffusion models, LLMs"),
            executed(2, "Write the report", "Draft report"),
        ],
    );
    let planner_inputs = planner.inputs();
    let mut agents = AgentMap::new();
    agents.insert(State::Plan, Box::new(planner.clone()) as Box<dyn Agent>);
    agents.insert(State::Execute, Box::new(executor.clone()) as Box<dyn Agent>);

    colored::control::set_override(false);
    let reporter = Reporter::new(80);
    let mut rendered = String::new();
    let memory = Orchestrator::new(
        Memory::new("Create a report on AI advancements in 2022"),
        agents,
    )
    .with_max_steps(Some(10))
    .run_with(|event: LoopEvent<'_>| rendered.push_str(&reporter.render(event)))
    .expect("run");

    assert_eq!(memory.current_state(), State::Completed);
    assert_eq!(
        memory.final_response(),
        Some("Report on AI advancements in 2022")
    );
    assert!(memory.task_list().iter().all(|task| task.result.is_some()));
    assert!(memory.check_invariants().is_empty());
    assert_eq!(planner_inputs.borrow().len(), 3);
    planner.assert_drained();
    executor.assert_drained();

    assert_eq!(rendered.matches("Current State: PLAN").count(), 3);
    assert_eq!(rendered.matches("Current State: EXECUTE").count(), 2);
    assert!(rendered.contains("Task Completed: Write the report"));
    assert!(rendered.contains("Objective Completed!"));

    let json = serde_json::to_value(&memory).expect("serialize");
    assert_eq!(json["current_state"], "completed");
    assert_eq!(json["task_list"][0]["id"], 1);
    assert!(json["current_task_id"].is_null());
}

#[test]
fn failed_executor_stops_the_loop() {
    let planner = ScriptedAgent::new("planner", vec![plan_next("a")]);
    let executor = ScriptedAgent::new("executor", vec![Err(anyhow::anyhow!("no network"))]);
    let mut agents = AgentMap::new();
    agents.insert(State::Plan, Box::new(planner) as Box<dyn Agent>);
    agents.insert(State::Execute, Box::new(executor) as Box<dyn Agent>);

    let err = Orchestrator::new(Memory::new("X"), agents)
        .run()
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::Invocation { ref agent, .. } if agent == "executor"));
    assert_eq!(
        format!("{:#}", anyhow::Error::new(err)),
        "agent 'executor' failed: no network"
    );
}
