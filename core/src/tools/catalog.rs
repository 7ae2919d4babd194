use crate::mcp::McpServices;
use crate::tools::RemoteTool;
use crate::trace::Tracer;
use crate::traits::Tool;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct Param {
    pub name: &'static str,
    pub kind: &'static str,
    pub description: &'static str,
    pub required: bool,
}

const fn required(name: &'static str, kind: &'static str, description: &'static str) -> Param {
    Param {
        name,
        kind,
        description,
        required: true,
    }
}

const fn optional(name: &'static str, kind: &'static str, description: &'static str) -> Param {
    Param {
        name,
        kind,
        description,
        required: false,
    }
}

/// A method of one of the built-in services.
#[derive(Debug, Clone, Copy)]
pub struct ToolDef {
    pub service: &'static str,
    pub method: &'static str,
    pub description: &'static str,
    pub params: &'static [Param],
}

impl ToolDef {
    pub fn tool_name(&self) -> String {
        format!("{}_{}", self.service, self.method)
    }

    pub fn schema(&self) -> Value {
        let mut properties = Map::new();
        for param in self.params {
            properties.insert(
                param.name.to_string(),
                json!({"type": param.kind, "description": param.description}),
            );
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

pub const CATALOG: &[ToolDef] = &[
    ToolDef {
        service: "youtube",
        method: "get_transcript",
        description: "Extract the transcript of a video",
        params: &[
            required("video_url", "string", "Video URL or id"),
            optional("lang", "string", "Transcript language, default 'en'"),
        ],
    },
    ToolDef {
        service: "youtube",
        method: "analyze_video",
        description: "Analyze a video and extract themes, activities and insights",
        params: &[
            required("video_url", "string", "Video URL or id"),
            optional("analysis_type", "string", "Depth of analysis, default 'full'"),
        ],
    },
    ToolDef {
        service: "youtube",
        method: "get_metadata",
        description: "Fetch title, channel and duration of a video",
        params: &[required("video_url", "string", "Video URL or id")],
    },
    ToolDef {
        service: "exa",
        method: "search",
        description: "Semantic search for local experiences and venues",
        params: &[
            required("query", "string", "What to look for"),
            optional("location", "string", "City or area"),
            optional("date", "string", "Date as YYYY-MM-DD"),
        ],
    },
    ToolDef {
        service: "exa",
        method: "find_events",
        description: "Find local events matching a list of topics",
        params: &[
            required("topics", "array", "Topics of interest"),
            required("location", "string", "City or area"),
            required("date", "string", "Date as YYYY-MM-DD"),
        ],
    },
    ToolDef {
        service: "maps",
        method: "route",
        description: "Compute a route between two places",
        params: &[
            required("origin", "string", "Start address"),
            required("destination", "string", "End address"),
            optional("mode", "string", "driving, walking, bicycling or transit"),
        ],
    },
    ToolDef {
        service: "maps",
        method: "generate_shareable_link",
        description: "Build a shareable map link for a route",
        params: &[
            required("origin", "string", "Start address"),
            required("destination", "string", "End address"),
            optional("waypoints", "array", "Intermediate stops"),
        ],
    },
    ToolDef {
        service: "maps",
        method: "generate_itinerary_route",
        description: "Plan an ordered route through several destinations",
        params: &[
            required("origin", "string", "Start address"),
            required("destinations", "array", "Places to visit in order"),
            optional("mode", "string", "driving, walking, bicycling or transit"),
        ],
    },
    ToolDef {
        service: "calendar",
        method: "create_event",
        description: "Create one calendar event and invite attendees",
        params: &[
            required("title", "string", "Event title"),
            required("description", "string", "Event description"),
            required("start_time", "string", "RFC 3339 start time"),
            required("end_time", "string", "RFC 3339 end time"),
            optional("attendees", "array", "Attendee emails"),
        ],
    },
    ToolDef {
        service: "calendar",
        method: "create_itinerary_events",
        description: "Create calendar events for every item of an itinerary",
        params: &[
            required("itinerary", "object", "Itinerary to schedule"),
            required("participants", "array", "Participant emails"),
            required("base_date", "string", "Date as YYYY-MM-DD"),
        ],
    },
    ToolDef {
        service: "tts",
        method: "generate_audio",
        description: "Synthesize speech from text",
        params: &[
            required("text", "string", "Text to speak"),
            optional("voice", "string", "Voice name"),
            optional("speed", "number", "Playback speed, default 1.0"),
        ],
    },
    ToolDef {
        service: "tts",
        method: "generate_podcast",
        description: "Produce a podcast episode from a script",
        params: &[
            required("script", "string", "Podcast script"),
            optional("title", "string", "Episode title"),
            optional("voice_settings", "object", "Voice options"),
        ],
    },
];

pub fn find(tool_name: &str) -> Option<&'static ToolDef> {
    CATALOG.iter().find(|def| def.tool_name() == tool_name)
}

/// Builds a [`RemoteTool`] for every catalog entry whose service is configured.
pub fn build_tools(services: &McpServices, tracer: &Tracer) -> Vec<Arc<dyn Tool>> {
    let mut tools: Vec<Arc<dyn Tool>> = vec![];

    for def in CATALOG {
        let Some(client) = services.get(def.service) else {
            debug!(service = def.service, "service not configured, skipping tool");
            continue;
        };

        tools.push(Arc::new(
            RemoteTool::new(client, def.method)
                .with_description(def.description)
                .with_schema(def.schema())
                .with_tracer(tracer.clone()),
        ));
    }

    tools
}
