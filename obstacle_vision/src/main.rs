// An example of how to use the `obstacle_vision` library. The host-side runner
// with real inputs lives in the `obstacle_runner` crate.

use obstacle_vision::config::PipelineConfig;
use obstacle_vision::pipeline::{BlobCandidate, CycleInput, ObstaclePipeline};

fn main() {
    println!("Obstacle Vision - Example Runner");

    let mut pipeline = match ObstaclePipeline::new(PipelineConfig::default()) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            return;
        }
    };

    // One obstacle straddling the beam, seen at half a metre for a full window.
    let obstacle = BlobCandidate::new(150, 100, 40, 40, 1_200);
    for cycle in 1..=10 {
        let report = pipeline.run_cycle(CycleInput {
            frame_width: 320,
            frame_height: 240,
            brightness: 140.0,
            candidates: vec![obstacle.clone()],
            distance: Some(500),
        });
        println!("cycle {cycle:2}: {:?}", report.measurement);
    }
}
