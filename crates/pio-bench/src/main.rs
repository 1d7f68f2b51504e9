mod cli;
mod json_output;
mod report;

use clap::Parser;
use mpi::traits::*;

use pio_backend_mock::MockBackend;
use pio_core::{timing::Timer, ElemType, FileState, IoDesc, Mode};
use pio_transport::{CoreConfig, CoreContext};

use cli::CliArgs;

fn main() {
    let universe = mpi::initialize().unwrap();
    let world = universe.world();
    let rank = world.rank();
    let nranks = world.size();

    let command_line = std::env::args().collect::<Vec<_>>().join(" ");
    let args = CliArgs::parse();

    let json_stdout = args.json;
    let json_file = args.json_file.clone();
    let json_mode = json_stdout || json_file.is_some();
    let print_text = !json_stdout;

    let buffer_size_limit = cli::parse_size(&args.buffer_size_limit);
    let mut config = CoreConfig::default();
    config.buffer_size_limit = buffer_size_limit;
    config.max_cached_io_regions = args.max_cached_io_regions;

    if rank == 0 && print_text {
        println!("pio-bench (pio-core write/read driver demo)");
        println!("  num_tasks             = {}", nranks);
        println!("  elems_per_rank        = {}", args.elems_per_rank);
        println!("  num_vars              = {}", args.num_vars);
        println!("  repetitions           = {}", args.repetitions);
        println!("  buffer_size_limit     = {} bytes", buffer_size_limit);
        println!("  max_cached_io_regions = {}", args.max_cached_io_regions);
    }

    let ctx = CoreContext::single_tier(world, config);
    let mut file = FileState::new(1, Mode::ReadWrite, ctx.config.buffer_size_limit);
    let mut backend = MockBackend::new(false);
    let file_id = pio_core::backend::FileId(1);
    let iodesc = IoDesc::symmetric_box(1, ElemType::I64, nranks as usize, args.elems_per_rank);
    let varids: Vec<i32> = (0..args.num_vars as i32).collect();
    // `symmetric_box` sizes the compute-side buffer at `ndof = nranks *
    // elems_per_rank` elements: one `elems_per_rank`-sized block per peer,
    // back to back (see `IoDesc::symmetric_box`'s `sdispls`).
    let arraylen = iodesc.ndof;

    if print_text {
        report::print_header(&ctx.compute_comm);
    }

    let mut results = Vec::with_capacity(args.repetitions as usize);
    for rep in 0..args.repetitions {
        let arrays: Vec<u8> = (0..args.num_vars)
            .flat_map(|v| (0..arraylen).map(move |i| (rank as i64) * 1_000_000 + (v as i64) * 1000 + i as i64))
            .flat_map(|x| x.to_ne_bytes())
            .collect();

        let mut write_timer = Timer::start();
        pio_driver::write_darray_multi(
            &ctx,
            &mut file,
            &mut backend,
            &file_id,
            &iodesc,
            &varids,
            arraylen,
            &arrays,
            None,
            None,
            false,
        )
        .unwrap_or_else(|e| panic!("write_darray_multi failed: {e}"));
        write_timer.stop();

        let mut read_timer = Timer::start();
        let mut readback = vec![0u8; arrays.len()];
        for (i, &varid) in varids.iter().enumerate() {
            let elem_size = iodesc.elem_size();
            let stride = arraylen * elem_size;
            let slot = &mut readback[i * stride..(i + 1) * stride];
            pio_driver::read_darray(&ctx, &mut file, &mut backend, &file_id, &iodesc, varid, arraylen, slot)
                .unwrap_or_else(|e| panic!("read_darray failed: {e}"));
        }
        read_timer.stop();

        if args.check && readback != arrays {
            panic!("rank {rank}: read-back payload does not match what was written");
        }

        let write_time = report::reduce_max_time(write_timer.elapsed(), &ctx.compute_comm);
        let read_time = report::reduce_max_time(read_timer.elapsed(), &ctx.compute_comm);
        let result = report::IterResult {
            rep,
            write_time,
            read_time,
            bytes_per_rank: arrays.len(),
        };
        if print_text {
            report::print_result(&result, nranks as usize, &ctx.compute_comm);
        }
        results.push(result);
    }

    if rank == 0 && json_mode {
        let doc = json_output::build_json(
            &results,
            nranks,
            args.elems_per_rank,
            args.num_vars,
            &command_line,
        );
        let json_str = serde_json::to_string_pretty(&doc).expect("failed to serialize JSON");
        if json_stdout {
            println!("{json_str}");
        }
        if let Some(path) = &json_file {
            std::fs::write(path, &json_str)
                .unwrap_or_else(|e| eprintln!("ERROR: failed to write JSON file: {e}"));
        }
    }

    ctx.compute_comm.barrier();
}
