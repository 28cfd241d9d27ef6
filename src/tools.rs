//! Retrieval tools the chat model can invoke.
//!
//! Each tool declares a name, description, and JSON Schema; the
//! [`ToolRegistry`] dispatches an invocation by name with the model's
//! arguments. Execution returns an explicit [`ToolOutcome`] carrying both
//! the text block fed back to the model and the source citations for the
//! caller — there is no shared "last sources" state between invocations.
//!
//! Argument problems and unresolvable course names are reported *in the
//! outcome text* so the model can tell the user; only a genuinely
//! unusable search stack surfaces as [`RetrievalError`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use lectern_core::models::SourceRef;
use lectern_core::store::SearchHit;

use crate::error::RetrievalError;
use crate::index::CourseIndex;
use crate::llm::ToolDefinition;

/// Result of one tool invocation: the formatted text block for the model
/// plus the citations collected while formatting it.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub text: String,
    pub sources: Vec<SourceRef>,
}

impl ToolOutcome {
    fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
        }
    }
}

/// An externally invocable operation with a declared schema.
#[async_trait]
pub trait AssistantTool: Send + Sync {
    /// Lowercase identifier with underscores, used for dispatch.
    fn name(&self) -> &str;

    /// One-line description the model uses to decide whether to call.
    fn description(&self) -> &str;

    /// JSON Schema for the parameters object.
    fn parameters_schema(&self) -> Value;

    /// Execute with the model-supplied arguments.
    async fn execute(&self, params: Value) -> Result<ToolOutcome, RetrievalError>;
}

/// Registry mapping tool names to handlers.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn AssistantTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the built-in course tools.
    pub fn with_course_tools(index: Arc<CourseIndex>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CourseSearchTool::new(index.clone())));
        registry.register(Box::new(CourseOutlineTool::new(index)));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn AssistantTool>) {
        self.tools.push(tool);
    }

    /// Declared schemas for every registered tool.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    /// Dispatch one invocation by name.
    ///
    /// An unknown name is reported in the outcome text (the model sent
    /// it, the model can correct it), not as an error.
    pub async fn execute(&self, name: &str, params: Value) -> Result<ToolOutcome, RetrievalError> {
        match self.tools.iter().find(|t| t.name() == name) {
            Some(tool) => tool.execute(params).await,
            None => Ok(ToolOutcome::text_only(format!("Tool '{}' not found", name))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// search_course_content
// ═══════════════════════════════════════════════════════════════════════

/// Semantic content search with fuzzy course-name matching and lesson
/// filtering.
pub struct CourseSearchTool {
    index: Arc<CourseIndex>,
}

impl CourseSearchTool {
    pub fn new(index: Arc<CourseIndex>) -> Self {
        Self { index }
    }

    /// Render hits into one text block and collect deduplicated sources.
    async fn format_results(&self, hits: &[SearchHit]) -> Result<ToolOutcome, RetrievalError> {
        let mut blocks = Vec::with_capacity(hits.len());
        let mut sources: Vec<SourceRef> = Vec::new();

        for hit in hits {
            let chunk = &hit.chunk;
            let header = match chunk.lesson_number {
                Some(n) => format!("[{} - Lesson {}]", chunk.course_title, n),
                None => format!("[{}]", chunk.course_title),
            };
            blocks.push(format!("{}\n{}", header, chunk.text));

            let already_cited = sources.iter().any(|s| {
                s.course_title == chunk.course_title && s.lesson_number == chunk.lesson_number
            });
            if !already_cited {
                let link = match chunk.lesson_number {
                    Some(n) => self.index.lesson_link(&chunk.course_title, n).await?,
                    None => None,
                };
                sources.push(SourceRef {
                    course_title: chunk.course_title.clone(),
                    lesson_number: chunk.lesson_number,
                    link,
                });
            }
        }

        Ok(ToolOutcome {
            text: blocks.join("\n\n"),
            sources,
        })
    }
}

#[async_trait]
impl AssistantTool for CourseSearchTool {
    fn name(&self) -> &str {
        "search_course_content"
    }

    fn description(&self) -> &str {
        "Search course materials with smart course name matching and lesson filtering"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to search for in the course content"
                },
                "course_name": {
                    "type": "string",
                    "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                },
                "lesson_number": {
                    "type": "integer",
                    "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutcome, RetrievalError> {
        let Some(query) = params.get("query").and_then(|q| q.as_str()).filter(|q| !q.trim().is_empty())
        else {
            return Ok(ToolOutcome::text_only("A non-empty 'query' is required."));
        };
        let course_name = params.get("course_name").and_then(|c| c.as_str());
        let lesson_number = params.get("lesson_number").and_then(|n| n.as_i64());

        // Resolve the fuzzy course reference first; a miss short-circuits
        // before any content search runs.
        let resolved_title = match course_name {
            Some(name) => match self.index.resolve_course_title(name).await? {
                Some(title) => Some(title),
                None => {
                    return Ok(ToolOutcome::text_only(format!(
                        "No course found matching '{}'",
                        name
                    )));
                }
            },
            None => None,
        };

        let hits = self
            .index
            .search(query, resolved_title.as_deref(), lesson_number)
            .await?;

        if hits.is_empty() {
            let mut filter_info = String::new();
            if let Some(title) = &resolved_title {
                filter_info.push_str(&format!(" in course '{}'", title));
            }
            if let Some(n) = lesson_number {
                filter_info.push_str(&format!(" in lesson {}", n));
            }
            return Ok(ToolOutcome::text_only(format!(
                "No relevant content found{}.",
                filter_info
            )));
        }

        self.format_results(&hits).await
    }
}

// ═══════════════════════════════════════════════════════════════════════
// get_course_outline
// ═══════════════════════════════════════════════════════════════════════

/// Course outline lookup: title, link, and the complete lesson list.
pub struct CourseOutlineTool {
    index: Arc<CourseIndex>,
}

impl CourseOutlineTool {
    pub fn new(index: Arc<CourseIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl AssistantTool for CourseOutlineTool {
    fn name(&self) -> &str {
        "get_course_outline"
    }

    fn description(&self) -> &str {
        "Get the complete outline and lesson list for a specific course"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "course_title": {
                    "type": "string",
                    "description": "Course title or partial title (e.g. 'MCP', 'RAG')"
                }
            },
            "required": ["course_title"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutcome, RetrievalError> {
        let Some(requested) = params
            .get("course_title")
            .and_then(|t| t.as_str())
            .filter(|t| !t.trim().is_empty())
        else {
            return Ok(ToolOutcome::text_only(
                "A non-empty 'course_title' is required.",
            ));
        };

        let Some(title) = self.index.resolve_course_title(requested).await? else {
            return Ok(ToolOutcome::text_only(format!(
                "No course found matching '{}'",
                requested
            )));
        };

        let Some(course) = self.index.course(&title).await? else {
            return Ok(ToolOutcome::text_only(format!(
                "Course metadata not found for '{}'",
                title
            )));
        };

        let mut lines = vec![
            format!("Course: {}", course.title),
            format!(
                "Course Link: {}",
                course.link.as_deref().unwrap_or("No link available")
            ),
            "Lessons:".to_string(),
        ];
        if course.lessons.is_empty() {
            lines.push("  No lessons found".to_string());
        } else {
            for lesson in &course.lessons {
                lines.push(format!("  {}. {}", lesson.number, lesson.title));
            }
        }

        Ok(ToolOutcome {
            text: lines.join("\n"),
            sources: vec![SourceRef {
                course_title: course.title.clone(),
                lesson_number: None,
                link: course.link.clone(),
            }],
        })
    }
}
