use serde::{Deserialize, Serialize};

use super::options::OptionMaps;
use super::route::Route;

/// Everything a full fetch returns: the route collection plus reference data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub options: OptionMaps,
}
