//! The tools shipped with the agent.
//!
//! | name                 | safety    |
//! |----------------------|-----------|
//! | `getWeather`         | auto      |
//! | `getOperationAdvice` | auto      |
//! | `handleSql`          | auto      |
//! | `createSql`          | sensitive |

mod advice;
mod sql;
mod weather;

pub use advice::{ADVICE, AdviceTool};
pub use sql::{CREATE_SQL, HANDLE_SQL, QueryTool, WriteTool};
pub use weather::{WEATHER, WeatherTool, parse_report};
