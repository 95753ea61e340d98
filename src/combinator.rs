// Join-all and race over per-motor tasks
//
// Each motor command is spawned into a JoinSet. A race aborts the losers and
// waits for every abort to land before returning, so no sibling is still
// running once the stage is over.

use tokio::task::JoinSet;
use tracing::debug;

use crate::error::RigError;
use crate::rig::{Corner, MotorTask};

/// First task to finish, and the siblings that were cancelled because of it
#[derive(Debug)]
pub struct RaceOutcome<T> {
    pub winner: Corner,
    pub value: T,
    pub cancelled: Vec<Corner>,
}

fn spawn_all<T: Send + 'static>(tasks: Vec<(Corner, MotorTask<T>)>) -> JoinSet<(Corner, Result<T, RigError>)> {
    let mut set = JoinSet::new();
    for (corner, task) in tasks {
        set.spawn(async move { (corner, task.await) });
    }
    set
}

async fn cancel_remaining<T: 'static>(set: &mut JoinSet<T>) {
    set.abort_all();
    while set.join_next().await.is_some() {}
}

/// Wait for every task. The first failure aborts the rest and is returned.
///
/// Results come back sorted by corner (clockwise).
pub async fn join_all<T: Send + 'static>(
    tasks: Vec<(Corner, MotorTask<T>)>,
) -> Result<Vec<(Corner, T)>, RigError> {
    let mut set = spawn_all(tasks);
    let mut results = Vec::with_capacity(set.len());

    while let Some(joined) = set.join_next().await {
        let outcome = joined.map_err(RigError::from).and_then(|(corner, result)| {
            result.map(|value| (corner, value))
        });
        match outcome {
            Ok(done) => results.push(done),
            Err(e) => {
                cancel_remaining(&mut set).await;
                return Err(e);
            }
        }
    }

    results.sort_by_key(|(corner, _)| corner.index());
    Ok(results)
}

/// Wait for the first task to finish, then cancel every sibling.
///
/// The first finisher's error is returned as-is; siblings are still
/// cancelled before that.
pub async fn race<T: Send + 'static>(
    tasks: Vec<(Corner, MotorTask<T>)>,
) -> Result<RaceOutcome<T>, RigError> {
    let mut corners: Vec<Corner> = tasks.iter().map(|(corner, _)| *corner).collect();
    let mut set = spawn_all(tasks);

    let first = set.join_next().await;
    cancel_remaining(&mut set).await;

    let (winner, result) = match first {
        Some(joined) => joined?,
        None => return Err(RigError::Config("race started with no tasks".to_string())),
    };
    corners.retain(|&corner| corner != winner);
    debug!("{} finished first, cancelled {:?}", winner, corners);

    Ok(RaceOutcome {
        winner,
        value: result?,
        cancelled: corners,
    })
}
