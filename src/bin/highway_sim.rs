// Closed-loop highway demo.
//
// A ring road with constant-speed traffic in all three lanes. The simulated
// car drives 50 points of the planner output per second and reports back
// five times per second, like the driving simulator the planner was built for.

use std::f64::consts::PI;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{error, info, LevelFilter};
use structopt::StructOpt;

use highway_planner::planner::parse_sensor_fusion;
use highway_planner::prediction::SensorFusionReading;
use highway_planner::utils::{colors, PathStyle, Visualizer};
use highway_planner::{Path2D, Point2D, PlannerConfig, PlannerResult, PlannerSession, RoadMap, Telemetry, WaypointMap};

/// Seconds between two telemetry messages
const MESSAGE_PERIOD: f64 = 0.2;
/// Output points driven per second
const POINTS_PER_SECOND: f64 = 50.0;
const MPS_TO_MPH: f64 = 2.236_936;

#[derive(Debug, StructOpt)]
#[structopt(name = "highway_sim", about = "Drive the highway planner around a ring road")]
struct Opt {
    /// Number of telemetry messages to simulate
    #[structopt(long, default_value = "1500")]
    ticks: usize,

    /// Planner configuration (TOML)
    #[structopt(long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Minimum log level
    #[structopt(long, default_value = "info")]
    log_level: LevelFilter,

    /// Seed for goal sampling
    #[structopt(long)]
    seed: Option<u64>,

    /// Save a PNG of the driven path and the final traffic here
    #[structopt(long, parse(from_os_str))]
    plot: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
struct TrafficCar {
    id: u32,
    s: f64,
    d: f64,
    speed: f64,
}

impl TrafficCar {
    fn step(&mut self, dt: f64, max_s: f64) {
        self.s = (self.s + self.speed * dt).rem_euclid(max_s);
    }

    /// Raw `[id, x, y, vx, vy, s, d]` row as the simulator reports it
    fn sensor_row(&self, road: &WaypointMap) -> [f64; 7] {
        let here = road.to_cartesian(self.s, self.d);
        let ahead = road.to_cartesian(self.s + 1.0, self.d);
        let heading = (ahead.y - here.y).atan2(ahead.x - here.x);
        [
            self.id as f64,
            here.x,
            here.y,
            self.speed * heading.cos(),
            self.speed * heading.sin(),
            self.s,
            self.d,
        ]
    }
}

fn setup_logger(level: LevelFilter) -> Result<(), fern::InitError> {
    let epoch = Instant::now();
    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{:10.6} {:5}] {}",
                epoch.elapsed().as_secs_f64(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}

fn initial_traffic(max_s: f64) -> Vec<TrafficCar> {
    let mut traffic = Vec::new();
    let lanes = [(2.0, 19.0), (6.0, 17.0), (10.0, 21.0)];
    for (lane, &(d, speed)) in lanes.iter().enumerate() {
        for k in 0..4 {
            traffic.push(TrafficCar {
                id: (lane * 4 + k) as u32,
                s: (60.0 + 180.0 * k as f64 + 45.0 * lane as f64).rem_euclid(max_s),
                d,
                speed: speed - k as f64,
            });
        }
    }
    traffic
}

fn run(opt: &Opt) -> PlannerResult<()> {
    let mut config = match &opt.config {
        Some(path) => PlannerConfig::load(path)?,
        None => PlannerConfig::default(),
    };
    if opt.seed.is_some() {
        config.trajectory.seed = opt.seed;
    }

    let road = WaypointMap::ring(config.session.max_s / (2.0 * PI), 720)?;
    config.session.max_s = road.max_s();
    let max_s = road.max_s();
    let lane_width = config.behavior.lane_width;

    let start = Instant::now();
    let mut session = PlannerSession::new(config, start);
    let mut traffic = initial_traffic(max_s);

    let (mut s, mut d) = (0.0, 6.0);
    let mut position = road.to_cartesian(s, d);
    let mut yaw = PI / 2.0;
    let mut speed = 0.0;
    let mut pending = Path2D::new();
    let mut driven = Path2D::from_points(vec![position]);
    let mut closest_gap = f64::MAX;
    let points_per_message = (POINTS_PER_SECOND * MESSAGE_PERIOD).round() as usize;

    for tick in 0..opt.ticks {
        let now = start + Duration::from_secs_f64(tick as f64 * MESSAGE_PERIOD);
        let rows: Vec<[f64; 7]> = traffic.iter().map(|car| car.sensor_row(&road)).collect();
        let sensor_fusion: Vec<SensorFusionReading> = parse_sensor_fusion(&rows)?;

        let (end_s, end_d) = match pending.last() {
            Some(end) => road.to_frenet(end.x, end.y, pending.end_heading().unwrap_or(yaw)),
            None => (s, d),
        };
        let telemetry = Telemetry::new(position.x, position.y, s, d, yaw, speed)
            .with_previous_path(pending.clone(), end_s, end_d)
            .with_sensor_fusion(sensor_fusion);

        let path = session.tick(&telemetry, &road, now);

        // drive the head of the new path
        let n = points_per_message.min(path.len());
        let previous = position;
        for point in &path.points[..n] {
            driven.push(*point);
        }
        if n > 0 {
            position = path.points[n - 1];
            let from = if n > 1 { path.points[n - 2] } else { previous };
            if position.distance(&from) > 1e-6 {
                yaw = (position.y - from.y).atan2(position.x - from.x);
            }
            speed = position.distance(&previous) / (n as f64 / POINTS_PER_SECOND) * MPS_TO_MPH;
            let frenet = road.to_frenet(position.x, position.y, yaw);
            s = frenet.0;
            d = frenet.1;
        }
        pending = Path2D::from_points(path.points[n..].to_vec());

        for car in traffic.iter_mut() {
            car.step(MESSAGE_PERIOD, max_s);
            let p = road.to_cartesian(car.s, car.d);
            closest_gap = closest_gap.min(p.distance(&position));
        }

        if tick % 25 == 0 {
            info!(
                "t={:6.1}s s={:8.1} d={:5.2} speed={:5.1} mph lane={} following={}",
                tick as f64 * MESSAGE_PERIOD,
                s,
                d,
                speed,
                session.behavior().committed_lane().id,
                session.is_following()
            );
        }
    }

    info!(
        "Drove {:.0} m in {:.0} s, {} lane changes, {} failed plans of {}, closest gap {:.1} m",
        driven.total_length(),
        opt.ticks as f64 * MESSAGE_PERIOD,
        session.behavior().lane_changes(),
        session.failures(),
        session.plans(),
        closest_gap
    );

    if let Some(plot) = &opt.plot {
        let mut vis = Visualizer::new();
        vis.set_title("highway_sim");
        vis.plot_lanes(&road, 0.0, max_s, lane_width, 3);
        let traffic_now: Vec<SensorFusionReading> = traffic
            .iter()
            .map(|car| {
                let Point2D { x, y } = road.to_cartesian(car.s, car.d);
                SensorFusionReading { id: car.id, x, y, vx: 0.0, vy: 0.0, s: car.s, d: car.d }
            })
            .collect();
        vis.plot_vehicles(&traffic_now);
        vis.plot_path(&driven, &PathStyle::new(colors::EGO_PATH, "Ego"));
        let path = plot.to_string_lossy();
        match vis.save_png(&path, 1200, 1200) {
            Ok(()) => info!("Saved plot to {}", path),
            Err(e) => error!("Cannot save plot: {}", e),
        }
    }
    Ok(())
}

fn main() {
    let opt = Opt::from_args();
    if let Err(e) = setup_logger(opt.log_level) {
        eprintln!("Cannot initialise logging: {}", e);
    }
    if let Err(e) = run(&opt) {
        error!("{}", e);
        std::process::exit(1);
    }
}
