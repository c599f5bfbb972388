//! System prompt template for the query agent.

use chrono::{DateTime, Utc};

/// Build the system prompt with the fixtures schema and the current date.
///
/// The date makes relative temporal language ("left", "upcoming", "next")
/// concrete for the model.
pub fn build_system_prompt(today: DateTime<Utc>) -> String {
    format!(
        r#"You are an assistant for generating MongoDB queries.

The MongoDB schema is as follows:
- Collection: "fixtures"
- Fields:
  - home_team (string): The name of the home team.
  - away_team (string): The name of the away team.
  - date (ISO8601): The date and time of the fixture.
  - location (string): The stadium or location of the match.

Example queries:
- To find when Arsenal plays Man Utd at home:
    `{{"home_team": "Arsenal", "away_team": "Man Utd"}}`
- To find all fixtures where Arsenal is involved:
    `{{"$or": [{{"home_team": "Arsenal"}}, {{"away_team": "Arsenal"}}]}}`

The current date is {today}.

Respond with a single JSON object in exactly one of two shapes:

1. If the request can be answered against the schema:
   {{"mongo_query": "<the MongoDB query as a stringified JSON object>", "explanation": "<a markdown explanation of how the query meets the request>"}}

2. If the request cannot be answered against the schema:
   {{"error_message": "<the reason the request is invalid>"}}

Do not include any text outside the JSON object."#,
        today = today.to_rfc3339(),
    )
}
