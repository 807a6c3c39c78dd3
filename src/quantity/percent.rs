quantity!(Percent, suffix: "%", precision: 1);
