use serde_json::{Value, json};

use super::{ConvexError, DocumentStore};

struct RunTemplate {
    name: &'static str,
    description: &'static str,
    prompt: &'static str,
    priority: &'static str,
    tags: [&'static str; 3],
    environment: &'static str,
}

const RUN_TEMPLATES: [RunTemplate; 3] = [
    RunTemplate {
        name: "E-commerce Checkout Flow",
        description: "Test the complete checkout process on an e-commerce site",
        prompt: "Test adding items to cart, proceeding to checkout, filling payment info, and completing purchase",
        priority: "high",
        tags: ["e-commerce", "checkout", "payment"],
        environment: "staging",
    },
    RunTemplate {
        name: "User Registration & Login",
        description: "Test user authentication flows",
        prompt: "Test user registration with email verification and subsequent login",
        priority: "normal",
        tags: ["auth", "registration", "login"],
        environment: "development",
    },
    RunTemplate {
        name: "Search & Navigation",
        description: "Test search functionality and site navigation",
        prompt: "Test search bar functionality, filters, and navigation between pages",
        priority: "low",
        tags: ["search", "navigation", "ui"],
        environment: "staging",
    },
];

pub const MAX_SAMPLE_RUNS: usize = RUN_TEMPLATES.len();
pub const MAX_SAMPLE_FLOWS_PER_RUN: usize = 2;

fn flow_args(test_run_id: &Value, run_name: &str, index: usize) -> Value {
    let (name, description, instructions, difficulty, category, steps) = if index == 0 {
        (
            format!("Flow 1 for {run_name}"),
            format!("First testing scenario for {run_name}"),
            format!("Navigate to the main page and perform the primary action for {run_name}"),
            "easy",
            "primary",
            5,
        )
    } else {
        (
            format!("Flow 2 for {run_name}"),
            format!("Secondary testing scenario for {run_name}"),
            format!("Test edge cases and error handling for {run_name}"),
            "medium",
            "edge-case",
            8,
        )
    };

    json!({
        "testRunId": test_run_id,
        "name": name,
        "description": description,
        "instructions": instructions,
        "order": index + 1,
        "estimatedDurationMinutes": 5 + index * 3,
        "successCriteria": [
            "Page loads successfully",
            "No console errors",
            "Expected elements are present",
        ],
        "metadata": {
            "difficulty": difficulty,
            "category": category,
            "expectedSteps": steps,
        },
    })
}

/// Create up to three template test runs with up to two flows each.
/// Stops at the first failed call; rows created before it stay.
pub async fn seed(
    store: &dyn DocumentStore,
    test_runs: usize,
    flows_per_run: usize,
) -> Result<Value, ConvexError> {
    let mut runs = Vec::new();
    let mut flows = Vec::new();

    for template in RUN_TEMPLATES.iter().take(test_runs) {
        let run_id = store
            .call(
                "testRuns:create",
                json!({
                    "name": template.name,
                    "description": template.description,
                    "prompt": template.prompt,
                    "metadata": {
                        "priority": template.priority,
                        "tags": template.tags,
                        "environment": template.environment,
                    },
                }),
            )
            .await?;
        runs.push(json!({ "id": run_id, "name": template.name }));

        for index in 0..flows_per_run.min(MAX_SAMPLE_FLOWS_PER_RUN) {
            let args = flow_args(&run_id, template.name, index);
            let name = args["name"].clone();
            let flow_id = store.call("flows:create", args).await?;
            flows.push(json!({ "id": flow_id, "name": name, "testRunId": run_id }));
        }
    }

    tracing::info!(test_runs = runs.len(), flows = flows.len(), "sample data created");
    Ok(json!({
        "message": format!("Created {} test runs and {} flows", runs.len(), flows.len()),
        "data": { "testRuns": runs, "flows": flows },
    }))
}
