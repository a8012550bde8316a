use std::collections::{HashMap, VecDeque};
use std::io::Write;

use clap::Parser;
use env_logger::Builder;
use log::{info, warn};
use serde::Serialize;

use dslab_vmsched::config::SchedulingConfig;
use dslab_vmsched::job::Job;
use dslab_vmsched::job_scheduler::job_scheduler_resolver;
use dslab_vmsched::machine::{Machine, MachineKind, MachineStateHistoryEntry, VmCreation};
use dslab_vmsched::slot::make_slots;
use dslab_vmsched::utilization_model::utilization_model_resolver;
use dslab_vmsched::vm::{vm_key, VirtualMachine};
use dslab_vmsched::vm_scheduler::vm_scheduler_resolver;
use dslab_vmsched::{Environment, SchedulingError};

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
/// Places VMs from the scenario on machines (first fit), runs the jobs and prints the JSON report.
struct Args {
    /// Path to scenario file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Stop the simulation at this time
    #[arg(short, long)]
    until: Option<f64>,
}

#[derive(Serialize)]
struct MachineReport<'a> {
    name: &'a str,
    utilization: &'a [MachineStateHistoryEntry],
    vms: Vec<&'a VirtualMachine>,
}

#[derive(Serialize)]
struct Report<'a> {
    time: f64,
    finished_jobs: &'a [Job],
    unfinished_jobs: usize,
    machines: Vec<MachineReport<'a>>,
}

struct PendingJob {
    submit_time: f64,
    vm_key: String,
    job: Job,
}

fn init_logger() {
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();
}

fn build_machines(config: &SchedulingConfig, env: &Environment) -> Result<Vec<Machine>, SchedulingError> {
    let mut machines = Vec::new();
    for machine_config in config.machines.iter() {
        let policy = machine_config.vm_scheduler.as_deref().unwrap_or("TimeShared");
        let kind = if machine_config.dynamic_workload.unwrap_or(false) {
            MachineKind::DynamicWorkload
        } else {
            MachineKind::Simple
        };
        for name in machine_config.instance_names() {
            let vm_scheduler = vm_scheduler_resolver(policy, make_slots(machine_config.slots, machine_config.mips))?;
            let machine = Machine::new(
                machines.len() as u32,
                machine_config.ram,
                machine_config.bw,
                machine_config.storage,
                vm_scheduler,
                kind,
                env.create_context(name),
            )
            .with_cost_per_sec(machine_config.cost_per_sec.unwrap_or(0.));
            machines.push(machine);
        }
    }
    Ok(machines)
}

fn build_vms(config: &SchedulingConfig, env: &Environment) -> Result<Vec<VirtualMachine>, SchedulingError> {
    let mut vms = Vec::new();
    for vm_config in config.vms.iter() {
        let policy = vm_config.job_scheduler.as_deref().unwrap_or("TimeShared");
        for _ in 0..vm_config.count.unwrap_or(1) {
            let id = vms.len() as u32;
            let user_id = vm_config.user_id.unwrap_or(0);
            let ctx = env.create_context(format!("vm-{}", vm_key(user_id, id)));
            let job_scheduler = job_scheduler_resolver(policy, ctx, vm_config.mips, vm_config.slots)?;
            vms.push(VirtualMachine::new(
                id,
                user_id,
                vm_config.mips,
                vm_config.slots,
                vm_config.ram,
                vm_config.bw,
                vm_config.size,
                vm_config.vmm.as_deref().unwrap_or("Xen"),
                job_scheduler,
            ));
        }
    }
    Ok(vms)
}

fn build_jobs(config: &SchedulingConfig, vm_keys: &[String]) -> Result<VecDeque<PendingJob>, SchedulingError> {
    let mut jobs = Vec::new();
    for job_config in config.jobs.iter() {
        let vm_key = vm_keys
            .get(job_config.vm as usize)
            .ok_or_else(|| SchedulingError::Config(format!("unknown vm {}", job_config.vm)))?;
        for _ in 0..job_config.count.unwrap_or(1) {
            let id = jobs.len() as u64;
            let job = Job::with_utilization_models(
                id,
                job_config.length,
                job_config.slots.unwrap_or(1),
                utilization_model_resolver(job_config.cpu_model.as_deref().unwrap_or("Full"))?,
                utilization_model_resolver(job_config.ram_model.as_deref().unwrap_or("Full"))?,
                utilization_model_resolver(job_config.bw_model.as_deref().unwrap_or("Full"))?,
            )?
            .with_file_sizes(job_config.file_size.unwrap_or(0), job_config.output_size.unwrap_or(0));
            jobs.push(PendingJob {
                submit_time: job_config.submit_time.unwrap_or(0.),
                vm_key: vm_key.clone(),
                job,
            });
        }
    }
    jobs.sort_by(|a, b| a.submit_time.total_cmp(&b.submit_time));
    Ok(jobs.into())
}

/// Creates VMs on the first machine which accepts them, returns the placement.
fn place_vms(machines: &mut [Machine], vms: Vec<VirtualMachine>) -> Result<HashMap<String, usize>, SchedulingError> {
    let mut placement = HashMap::new();
    for vm in vms {
        let key = vm.key().to_owned();
        let mut pending = Some(vm);
        for (idx, machine) in machines.iter_mut().enumerate() {
            let vm = match pending.take() {
                Some(vm) => vm,
                None => break,
            };
            if !machine.is_suitable_for_vm(&vm) {
                pending = Some(vm);
                continue;
            }
            match machine.create_vm(vm)? {
                VmCreation::Created => {
                    info!("vm {} is placed on {}", key, machine.name());
                    placement.insert(key.clone(), idx);
                }
                VmCreation::Rejected(verdict, vm) => {
                    info!("vm {} is rejected by {}: {:?}", key, machine.name(), verdict);
                    pending = Some(*vm);
                }
            }
        }
        if pending.is_some() {
            warn!("vm {} can't be placed", key);
        }
    }
    Ok(placement)
}

fn run(args: &Args) -> Result<(), SchedulingError> {
    let config = SchedulingConfig::from_file(&args.config)?;
    let env = Environment::from_config(&config);
    let mut machines = build_machines(&config, &env)?;
    let vms = build_vms(&config, &env)?;
    let vm_keys: Vec<String> = vms.iter().map(|vm| vm.key().to_owned()).collect();
    let mut pending_jobs = build_jobs(&config, &vm_keys)?;
    let placement = place_vms(&mut machines, vms)?;
    let until = args.until.unwrap_or(f64::MAX);

    let mut finished_jobs = Vec::new();
    let mut dropped_jobs = 0;
    let mut time = 0.;
    loop {
        env.set_time(time);
        let mut next_event = f64::MAX;
        for machine in machines.iter_mut() {
            next_event = next_event.min(machine.update_all_vms_processing(time)?);
            finished_jobs.extend(machine.take_finished_jobs());
        }

        let mut submitted = false;
        while pending_jobs.front().map_or(false, |pending| pending.submit_time <= time) {
            if let Some(pending) = pending_jobs.pop_front() {
                let job_id = pending.job.id();
                let accepted = placement
                    .get(&pending.vm_key)
                    .and_then(|idx| machines[*idx].submit_job(&pending.vm_key, pending.job, 0.));
                if accepted.is_none() {
                    warn!("job #{} is dropped: vm {} is not placed", job_id, pending.vm_key);
                    dropped_jobs += 1;
                }
                submitted = true;
            }
        }
        if submitted {
            for machine in machines.iter_mut() {
                next_event = next_event.min(machine.update_all_vms_processing(time)?);
            }
        }

        if let Some(pending) = pending_jobs.front() {
            next_event = next_event.min(pending.submit_time);
        }
        if next_event == f64::MAX || next_event > until {
            break;
        }
        time = next_event;
    }

    let unfinished_jobs = config.jobs.iter().map(|job| job.count.unwrap_or(1) as usize).sum::<usize>()
        - finished_jobs.len()
        - dropped_jobs;
    info!(
        "simulation finished at {:.3}: {} jobs finished, {} unfinished",
        time,
        finished_jobs.len(),
        unfinished_jobs
    );
    let report = Report {
        time,
        finished_jobs: &finished_jobs,
        unfinished_jobs,
        machines: machines
            .iter()
            .map(|machine| MachineReport {
                name: machine.name(),
                utilization: machine.state_history(),
                vms: machine.vms().collect(),
            })
            .collect(),
    };
    let json = serde_json::to_string_pretty(&report).map_err(|e| SchedulingError::Config(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

fn main() {
    init_logger();
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
