use paircorr::{NearestNeighbors, PeriodicBox, Rdf, Vector3D};

use rand::distr::{Distribution, Uniform};
use rand_xoshiro::Xoshiro256PlusPlus;
use rand_xoshiro::rand_core::SeedableRng;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let n_points = std::env::args().nth(1)
        .map(|arg| arg.parse::<usize>())
        .transpose()?
        .unwrap_or(10_000);

    // enable collection of profiling data
    time_graph::enable_data_collection(true);
    // clear any existing collected data
    time_graph::clear_collected_data();

    time_graph::spanned!("Full calculation", {
        run_analysis(n_points)
    })?;

    // get the call graph and display it
    let graph = time_graph::get_full_graph();
    // (this requires the "table" feature for the time_graph crate)
    println!("{}", graph.as_short_table());

    // also available for saving profiling data to the disk & future analysis
    // (this requires the "json" feature for the time_graph crate)
    println!("{}", graph.as_json());

    Ok(())
}

/// Compute the RDF and nearest neighbors over a few frames of random points
fn run_analysis(n_points: usize) -> Result<(), Box<dyn std::error::Error>> {
    let length = f64::cbrt(n_points as f64);
    let periodic_box = PeriodicBox::cubic(length)?;

    let mut rdf = Rdf::from_json(r#"{"max_radius": 3.0, "bin_width": 0.05}"#)?;
    let mut nn = NearestNeighbors::from_json(r#"{"max_radius": 0.5, "n_neighbors": 12}"#)?;

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
    let uniform = Uniform::new(0.0, length)?;
    for _ in 0..10 {
        let points = (0..n_points)
            .map(|_| Vector3D::new(uniform.sample(&mut rng), uniform.sample(&mut rng), uniform.sample(&mut rng)))
            .collect::<Vec<_>>();

        rdf.accumulate(periodic_box, &points, &points)?;
        nn.compute(periodic_box, &points, &points)?;
    }

    let g_r = rdf.rdf();
    println!("g(r) in the last bin: {}", g_r[g_r.len() - 1]);
    println!("final search radius: {}", nn.max_radius());

    Ok(())
}
