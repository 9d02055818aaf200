//! `render_chart` — validate a minimal chart spec and hand back a
//! normalized Vega-Lite document for the client to render. The gateway has
//! no server-side rasterizer; this tool's job is shaping and validating
//! the data, not drawing pixels.

use async_trait::async_trait;
use serde_json::{Value, json};
use spaceduck_domain::error::Result;

use crate::registry::{Tool, ToolOutput};

pub struct ChartTool;

#[async_trait]
impl Tool for ChartTool {
    fn name(&self) -> &str {
        "render_chart"
    }

    fn description(&self) -> &str {
        "Render a simple chart (bar, line, or pie) from labeled numeric data."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "kind": { "type": "string", "enum": ["bar", "line", "pie"] },
                "title": { "type": "string" },
                "labels": { "type": "array", "items": { "type": "string" } },
                "values": { "type": "array", "items": { "type": "number" } }
            },
            "required": ["kind", "labels", "values"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let kind = args.get("kind").and_then(Value::as_str).unwrap_or("bar");
        if !["bar", "line", "pie"].contains(&kind) {
            return Ok(ToolOutput::error(format!("unsupported chart kind: {kind}")));
        }

        let labels = match args.get("labels").and_then(Value::as_array) {
            Some(l) => l,
            None => return Ok(ToolOutput::error("labels is required")),
        };
        let values = match args.get("values").and_then(Value::as_array) {
            Some(v) => v,
            None => return Ok(ToolOutput::error("values is required")),
        };
        if labels.len() != values.len() {
            return Ok(ToolOutput::error(
                "labels and values must be the same length",
            ));
        }

        let mark = match kind {
            "pie" => "arc",
            "line" => "line",
            _ => "bar",
        };

        let data: Vec<Value> = labels
            .iter()
            .zip(values.iter())
            .map(|(label, value)| json!({ "label": label, "value": value }))
            .collect();

        let spec = json!({
            "$schema": "https://vega.github.io/schema/vega-lite/v5.json",
            "title": args.get("title").cloned().unwrap_or(Value::Null),
            "mark": mark,
            "data": { "values": data },
            "encoding": {
                "x": { "field": "label", "type": "nominal" },
                "y": { "field": "value", "type": "quantitative" },
                "theta": { "field": "value", "type": "quantitative" }
            }
        });

        Ok(ToolOutput::ok(spec.to_string()))
    }
}
