use crate::error::PipelineError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// What a run is about. Never changed once a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPipelineInput")]
pub struct PipelineInput {
    pub content_ref: String,
    pub location: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub participants: Vec<String>,
}

/// Shape read from batch files and `run.json`, normalized on the way in.
#[derive(Deserialize)]
struct RawPipelineInput {
    content_ref: String,
    location: String,
    date: NaiveDate,
    #[serde(default)]
    participants: Vec<String>,
}

impl TryFrom<RawPipelineInput> for PipelineInput {
    type Error = PipelineError;

    fn try_from(raw: RawPipelineInput) -> Result<Self, Self::Error> {
        Ok(PipelineInput::new(raw.content_ref, raw.location, raw.date)?
            .with_participants(raw.participants))
    }
}

impl PipelineInput {
    pub fn new(
        content_ref: impl Into<String>,
        location: impl Into<String>,
        date: NaiveDate,
    ) -> Result<Self, PipelineError> {
        let input = Self {
            content_ref: content_ref.into().trim().to_string(),
            location: location.into().trim().to_string(),
            date,
            participants: vec![],
        };
        input.validate()?;
        Ok(input)
    }

    /// Like [`PipelineInput::new`] with the date given as `YYYY-MM-DD`.
    pub fn parse(
        content_ref: impl Into<String>,
        location: impl Into<String>,
        date: &str,
    ) -> Result<Self, PipelineError> {
        let date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).map_err(|e| {
            PipelineError::InvalidInput(format!("date '{date}' is not YYYY-MM-DD: {e}"))
        })?;
        Self::new(content_ref, location, date)
    }

    pub fn with_participants<I, S>(mut self, participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.participants = participants
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        self
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.content_ref.trim().is_empty() {
            return Err(PipelineError::InvalidInput("content_ref is empty".to_string()));
        }
        if self.location.trim().is_empty() {
            return Err(PipelineError::InvalidInput("location is empty".to_string()));
        }
        Ok(())
    }

    pub fn date_string(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    /// Fills `{content_ref}`, `{location}`, `{date}` and `{participants}`.
    pub fn render(&self, template: &str) -> String {
        let participants = if self.participants.is_empty() {
            "none".to_string()
        } else {
            self.participants.join(", ")
        };

        template
            .replace("{content_ref}", &self.content_ref)
            .replace("{location}", &self.location)
            .replace("{date}", &self.date_string())
            .replace("{participants}", &participants)
    }
}
