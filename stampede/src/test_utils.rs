/// Iteration with a skewed-normal simulated request latency around `$mean`, recording one
/// request with result `$res` and a check named `"ok"`.
macro_rules! mock_iteration {
    ($mean:expr, $std:expr, $res:expr) => {
        || async {
            let mean: Duration = $mean;
            let std: Duration = $std;
            let res: Result<(), ()> = crate::transaction::transaction_hook(async {
                let normal = SkewNormal::new(mean.as_secs_f64(), std.as_secs_f64(), 20.).unwrap();
                let v: f64 = normal.sample(&mut rand::thread_rng()).max(0.);
                tokio::time::sleep(Duration::from_secs_f64(v)).await;
                $res
            })
            .await;
            crate::transaction::check(&res, "ok", |r| r.is_ok());
        }
    };
}

pub(crate) use mock_iteration;
